use kippu::felica::cybernet::HistoryRecord;
use kippu::stations::{Language, LocationKey, Station, StationResolver, StationTable};
use owo_colors::OwoColorize;

pub fn history_record<T: StationTable>(
    record: &HistoryRecord,
    resolver: Option<&StationResolver<T>>,
    lang: Language,
) {
    println!(
        "┏╸{} {}╺╸{}╺╸{}",
        "Record".italic(),
        record.sequence,
        record.terminal_type,
        record.tx_type
    );
    match record.date {
        Some(date) if record.terminal_type.is_product_sale() => {
            println!("┠─╴Date: {}", date.format("%Y-%m-%d %H:%M"))
        }
        Some(date) => println!("┠─╴Date: {}", date.format("%Y-%m-%d")),
        None => println!("┠─╴Date: {}", "unknown".italic()),
    }

    let locations = [
        ("Entry", record.entry_location()),
        ("Exit", record.exit_location()),
    ];
    for (label, key) in locations {
        let Some(key) = key else { continue };
        let label = if key.is_bus { "Stop" } else { label };
        println!("┠┬╴{}: {}", label, code(&key));
        match resolver.and_then(|r| r.resolve(&key, lang).ok()) {
            Some(station) => println!("┃└─╴{}", name(&station)),
            None => println!("┃└─╴{}", "unknown".italic()),
        }
    }

    println!("┠─╴Balance: ¥{}", record.balance);
    println!("┗─╴Region: {:02X}", record.region);
}

pub fn station(key: &LocationKey, station: &Station) {
    println!("┏╸{}╺╸{}", code(key), name(station));
    if let Some(v) = &station.company_name {
        println!("┠─╴Company: {}", v);
    }
    if let Some(v) = &station.line_name {
        println!("┠─╴Line: {}", v);
    }
    if let Some(v) = &station.station_name {
        println!("┠─╴Station: {}", v);
    }
    match (&station.latitude, &station.longitude) {
        (Some(lat), Some(lon)) => println!("┗─╴Location: {}, {}", lat, lon),
        _ => println!("┗─╴Location: {}", "unknown".italic()),
    }
}

fn code(key: &LocationKey) -> String {
    if key.is_bus {
        format!("{:04X}/{:04X}", key.line, key.station)
    } else {
        format!("{:X}/{:02X}/{:02X}", key.area(), key.line, key.station)
    }
}

fn name(station: &Station) -> String {
    [
        station.company_name.as_deref(),
        station.line_name.as_deref(),
        station.station_name.as_deref(),
    ]
    .into_iter()
    .flatten()
    .collect::<Vec<_>>()
    .join(" / ")
}
