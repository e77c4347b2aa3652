//! Reverse engineered Japan Railway Cybernetics Association standards.
//!
//! These structures are used by common transit cards in Japan (Suica, PASMO, ICOCA, and their
//! friends), but there's no official public documentation, so this is all based on
//! reverse-engineering.
//!
//! https://www.wdic.org/w/RAIL/IC%E3%82%AB%E3%83%BC%E3%83%89%E4%B9%97%E8%BB%8A%E5%88%B8
//! https://ja.osdn.net/projects/felicalib/wiki/suica
//! https://github.com/micolous/metrodroid/wiki/Suica
//!
//! Station codes: https://www.denno.net/SFCardFan/ (offline as of writing, but on archive.org)
pub mod date;

use std::fmt;

use chrono::NaiveDateTime;
use nom::bytes::complete::take;
use nom::combinator::{map, map_res};
use num_enum::FromPrimitive;
use tap::TapFallible;
use tracing::{debug, trace_span, warn};

use super::{Block, IResult, BLOCK_LEN};
use crate::bits::{le_word_at, u24_at, word_at};
use crate::stations::LocationKey;
use crate::Error;

pub use date::extract_date;

/// The kind of terminal that wrote a record.
///
/// Japanese names are from the felicalib wiki; the English ones are best-effort translations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, FromPrimitive)]
#[repr(u8)]
pub enum TerminalType {
    FareAdjustmentMachine = 0x03, // "精算機"
    HandheldTerminal = 0x04,      // "携帯型端末"
    OnboardTerminal = 0x05,       // "車載端末", ie. on a bus.
    #[num_enum(alternatives = [0x08])]
    TicketMachine = 0x07, // "券売機"
    DepositMachine = 0x09,             // "入金機", also does quick charges.
    TicketMachineTokyoMonorail = 0x12, // "券売機 (東京モノレール)"
    #[num_enum(alternatives = [0x14, 0x15])]
    TicketMachineOther = 0x13, // "券売機 (その他)"
    FareGate = 0x16,                    // "改札機"
    SimpleFareGate = 0x17,              // "簡易改札機"
    CounterTerminal = 0x18,             // "窓口端末"
    GreenCounterTerminal = 0x19,        // "窓口端末 (みどりの窓口)"
    FareGateTerminal = 0x1A,            // "改札端末"
    MobilePhone = 0x1B,                 // "携帯電話"
    ConnectionAdjustmentMachine = 0x1C, // "乗継精算機"
    TransferAdjustmentMachine = 0x1D,   // "連絡改札機"
    SimpleDepositMachine = 0x1F,        // "簡易入金機"
    #[num_enum(alternatives = [0x48])]
    ViewAltte = 0x46, // JR East's VIEW ALTTE ATMs.
    ProductSalesTerminal = 0xC7, // "物販端末"
    VendingMachine = 0xC8,       // "自販機"
    #[num_enum(catch_all)]
    Unknown(u8),
}

impl TerminalType {
    /// Product sales carry a time of day and no stations.
    pub fn is_product_sale(self) -> bool {
        matches!(self, Self::ProductSalesTerminal | Self::VendingMachine)
    }

    /// Bus records carry a bus line and stop instead of rail stations.
    pub fn is_bus(self) -> bool {
        self == Self::OnboardTerminal
    }

    /// Key of the localised display string for this category, if it has one.
    /// Vendor names and unknown codes are displayed as-is.
    pub fn resource_key(self) -> Option<&'static str> {
        Some(match self {
            Self::FareAdjustmentMachine => "felica_terminal_fare_adjustment",
            Self::HandheldTerminal => "felica_terminal_portable",
            Self::OnboardTerminal => "felica_terminal_vehicle",
            Self::TicketMachine => "felica_terminal_ticket",
            Self::DepositMachine => "felica_terminal_deposit_quick_charge",
            Self::TicketMachineTokyoMonorail => "felica_terminal_tvm_tokyo_monorail",
            Self::TicketMachineOther => "felica_terminal_tvm_etc",
            Self::FareGate => "felica_terminal_ticket_gate",
            Self::SimpleFareGate => "felica_terminal_simple_ticket_gate",
            Self::CounterTerminal => "felica_terminal_booth",
            Self::GreenCounterTerminal => "felica_terminal_booth_green",
            Self::FareGateTerminal => "felica_terminal_ticket_gate_terminal",
            Self::MobilePhone => "felica_terminal_mobile_phone",
            Self::ConnectionAdjustmentMachine => "felica_terminal_connection_adjustment",
            Self::TransferAdjustmentMachine => "felica_terminal_transfer_adjustment",
            Self::SimpleDepositMachine => "felica_terminal_simple_deposit",
            Self::ProductSalesTerminal => "felica_terminal_pos",
            Self::VendingMachine => "felica_terminal_vending",
            Self::ViewAltte | Self::Unknown(_) => return None,
        })
    }
}

impl fmt::Display for TerminalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::FareAdjustmentMachine => "Fare Adjustment Machine",
            Self::HandheldTerminal => "Portable Terminal",
            Self::OnboardTerminal => "Vehicle Terminal",
            Self::TicketMachine => "Ticket Machine",
            Self::DepositMachine => "Deposit/Quick Charge Machine",
            Self::TicketMachineTokyoMonorail => "Ticket Machine (Tokyo Monorail)",
            Self::TicketMachineOther => "Ticket Machine (Other)",
            Self::FareGate => "Ticket Gate",
            Self::SimpleFareGate => "Simple Ticket Gate",
            Self::CounterTerminal => "Booth",
            Self::GreenCounterTerminal => "Booth (Green Window)",
            Self::FareGateTerminal => "Ticket Gate Terminal",
            Self::MobilePhone => "Mobile Phone",
            Self::ConnectionAdjustmentMachine => "Connection Adjustment Machine",
            Self::TransferAdjustmentMachine => "Transfer Adjustment Machine",
            Self::SimpleDepositMachine => "Simple Deposit Machine",
            Self::ViewAltte => "VIEW ALTTE",
            Self::ProductSalesTerminal => "Point of Sale Terminal",
            Self::VendingMachine => "Vending Machine",
            Self::Unknown(v) => return write!(f, "Console 0x{:02x}", v),
        })
    }
}

/// What happened in a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, FromPrimitive)]
#[repr(u8)]
pub enum TransactionType {
    ExitFareGate = 0x01,                 // "運賃支払(改札出場)"
    Charge = 0x02,                       // "チャージ"
    TicketPurchaseMagnetic = 0x03,       // "券購(磁気券購入)"
    Adjustment = 0x04,                   // "精算"
    AdjustmentAtEntrance = 0x05,         // "精算 (入場精算)"
    AttendantExit = 0x06,                // "窓出 (改札窓口処理)"
    NewIssue = 0x07,                     // "新規 (新規発行)"
    AttendantDebit = 0x08,               // "控除 (窓口控除)"
    BusPiTaPa = 0x0D,                    // "バス (PiTaPa系)"
    BusIruCa = 0x0F,                     // "バス (IruCa系)"
    Reissue = 0x11,                      // "再発 (再発行処理)"
    Shinkansen = 0x13,                   // "支払 (新幹線利用)"
    EntranceAutoCharge = 0x14,           // "入A (入場時オートチャージ)"
    ExitAutoCharge = 0x15,               // "出A (出場時オートチャージ)"
    BusCharge = 0x1F,                    // "入金 (バスチャージ)"
    TicketPurchaseSpecialBusTram = 0x23, // "券購 (バス路面電車企画券購入)"
    ProductSale = 0x46,                  // "物販"
    BonusCharge = 0x48,                  // "特典 (特典チャージ)"
    RegisterCharge = 0x49,               // "入金 (レジ入金)"
    ProductSaleCancel = 0x4A,            // "物販取消"
    ProductSaleAtEntrance = 0x4B,        // "入物 (入場物販)"
    AdjustmentThirdParty = 0x84,         // "精算 (他社精算)"
    AdjustmentAtEntranceThirdParty = 0x85, // "精算 (他社入場精算)"
    ProductSaleCash = 0xC6,              // "物現 (現金併用物販)"
    ProductSaleAtEntranceCash = 0xCB,    // "入物 (入場現金併用物販)"
    #[num_enum(catch_all)]
    Unknown(u8),
}

impl TransactionType {
    /// Charges happen at a machine, not a station, so they carry no stations.
    pub fn is_charge(self) -> bool {
        self == Self::Charge
    }

    /// Key of the localised display string for this category, if it has one.
    pub fn resource_key(self) -> Option<&'static str> {
        Some(match self {
            Self::ExitFareGate => "felica_process_fare_exit_gate",
            Self::Charge => "felica_process_charge",
            Self::TicketPurchaseMagnetic => "felica_process_purchase_magnetic",
            Self::Adjustment => "felica_process_fare_adjustment",
            Self::AdjustmentAtEntrance => "felica_process_admission_payment",
            Self::AttendantExit => "felica_process_booth_exit",
            Self::NewIssue => "felica_process_issue_new",
            Self::AttendantDebit => "felica_process_booth_deduction",
            Self::BusPiTaPa => "felica_process_bus_pitapa",
            Self::BusIruCa => "felica_process_bus_iruca",
            Self::Reissue => "felica_process_reissue",
            Self::Shinkansen => "felica_process_payment_shinkansen",
            Self::EntranceAutoCharge => "felica_process_entry_a_autocharge",
            Self::ExitAutoCharge => "felica_process_exit_a_autocharge",
            Self::BusCharge => "felica_process_deposit_bus",
            Self::TicketPurchaseSpecialBusTram => "felica_process_purchase_special_ticket",
            Self::ProductSale => "felica_process_merchandise_purchase",
            Self::BonusCharge => "felica_process_bonus_charge",
            Self::RegisterCharge => "felica_process_register_deposit",
            Self::ProductSaleCancel => "felica_process_merchandise_cancel",
            Self::ProductSaleAtEntrance => "felica_process_merchandise_admission",
            Self::AdjustmentThirdParty => "felica_process_payment_thirdparty",
            Self::AdjustmentAtEntranceThirdParty => "felica_process_admission_thirdparty",
            Self::ProductSaleCash => "felica_process_merchandise_purchase_cash",
            Self::ProductSaleAtEntranceCash => "felica_process_merchandise_admission_cash",
            Self::Unknown(_) => return None,
        })
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::ExitFareGate => "Fare Payment (Exit Gate)",
            Self::Charge => "Charge",
            Self::TicketPurchaseMagnetic => "Ticket Purchase (Magnetic)",
            Self::Adjustment => "Fare Adjustment",
            Self::AdjustmentAtEntrance => "Admission Payment",
            Self::AttendantExit => "Booth Exit",
            Self::NewIssue => "New Issue",
            Self::AttendantDebit => "Booth Deduction",
            Self::BusPiTaPa => "Bus (PiTaPa)",
            Self::BusIruCa => "Bus (IruCa)",
            Self::Reissue => "Reissue",
            Self::Shinkansen => "Payment (Shinkansen)",
            Self::EntranceAutoCharge => "Entry (Auto-Charge)",
            Self::ExitAutoCharge => "Exit (Auto-Charge)",
            Self::BusCharge => "Deposit (Bus)",
            Self::TicketPurchaseSpecialBusTram => "Special Ticket Purchase",
            Self::ProductSale => "Merchandise Purchase",
            Self::BonusCharge => "Bonus Charge",
            Self::RegisterCharge => "Register Deposit",
            Self::ProductSaleCancel => "Merchandise Cancel",
            Self::ProductSaleAtEntrance => "Merchandise (Admission)",
            Self::AdjustmentThirdParty => "Payment (Third Party)",
            Self::AdjustmentAtEntranceThirdParty => "Admission (Third Party)",
            Self::ProductSaleCash => "Merchandise Purchase (Cash)",
            Self::ProductSaleAtEntranceCash => "Merchandise (Admission, Cash)",
            Self::Unknown(v) => return write!(f, "Process 0x{:02x}", v),
        })
    }
}

/// A line + station pair, as written on the card. Rail codes are single bytes, bus codes are
/// full words.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StationCode {
    pub line: u16,
    pub station: u16,
}

/// Where a record happened, if anywhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Product sales and charges don't record stations.
    None,
    Rail { entry: StationCode, exit: StationCode },
    Bus(StationCode),
}

/// Historical record (also known as an Entry/Exit record).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistoryRecord {
    pub terminal_type: TerminalType,
    pub tx_type: TransactionType,
    pub unknown: u16, // ???
    /// None if the card didn't record one, or recorded one that doesn't exist.
    pub date: Option<NaiveDateTime>,
    pub route: Route,
    /// Remaining balance after this transaction, in yen.
    pub balance: u16,
    pub sequence: u32,
    pub region: u8,
}

impl HistoryRecord {
    pub fn parse(data: &[u8]) -> IResult<Self> {
        map(
            map_res(take(BLOCK_LEN), |raw: &[u8]| Block::try_from(raw)),
            |block| Self::decode(&block),
        )(data)
    }

    /// Decodes a history block. This can't fail: a nonsensical block decodes into a
    /// nonsensical (but well-formed) record.
    pub fn decode(block: &Block) -> Self {
        let span = trace_span!("HistoryRecord");
        let _enter = span.enter();

        let data = block.as_bytes();
        let terminal_type = TerminalType::from(data[0]);
        let tx_type = TransactionType::from(data[1]);
        let is_product_sale = terminal_type.is_product_sale();

        // The date is checked before the time, so a bad time still leaves a usable date.
        let date = match extract_date(is_product_sale, block) {
            Err(err @ Error::InvalidTime { .. }) => {
                warn!(
                    %err,
                    raw = hex::encode_upper(data),
                    "Record has a malformed time, keeping only the date"
                );
                extract_date(false, block).ok().flatten()
            }
            res => res
                .tap_err(|err| {
                    warn!(
                        %err,
                        raw = hex::encode_upper(data),
                        "Record has a malformed date, leaving it blank"
                    )
                })
                .ok()
                .flatten(),
        };

        let route = if is_product_sale || tx_type.is_charge() {
            Route::None
        } else if terminal_type.is_bus() {
            Route::Bus(StationCode {
                line: word_at(data, 6),
                station: word_at(data, 8),
            })
        } else {
            Route::Rail {
                entry: StationCode {
                    line: data[6].into(),
                    station: data[7].into(),
                },
                exit: StationCode {
                    line: data[8].into(),
                    station: data[9].into(),
                },
            }
        };

        let record = Self {
            terminal_type,
            tx_type,
            unknown: word_at(data, 2),
            date,
            route,
            balance: le_word_at(data, 10),
            sequence: u24_at(data, 12),
            region: data[15],
        };
        debug!(?record, "Decoded history record");
        record
    }

    /// Where the record starts: the entry station, or the bus stop.
    pub fn entry_location(&self) -> Option<LocationKey> {
        match self.route {
            Route::None => None,
            Route::Rail { entry, .. } => Some(LocationKey::rail(self.region, entry)),
            Route::Bus(stop) => Some(LocationKey::bus(self.region, stop)),
        }
    }

    /// Where the record ends: the exit station. Bus records only have the one stop.
    pub fn exit_location(&self) -> Option<LocationKey> {
        match self.route {
            Route::Rail { exit, .. } => Some(LocationKey::rail(self.region, exit)),
            Route::None | Route::Bus(_) => None,
        }
    }
}
