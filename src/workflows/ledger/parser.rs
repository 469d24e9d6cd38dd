use super::normalizer::{clean_cell, parse_date, parse_money};
use crate::workflows::outreach::OrderRecord;
use chrono::NaiveDate;
use serde::Serialize;
use std::fmt;
use std::io::Read;
use tracing::warn;

/// Ledger columns the importer understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LedgerField {
    Name,
    Phone,
    Address,
    OrderDate,
    GrossRevenue,
    NetRevenue,
    PaymentAmount,
    RefundAmount,
    RefundType,
    RefundStatus,
    OrderStatus,
    Platform,
    Category,
    ItemName,
    TrackingNumber,
}

impl LedgerField {
    const ALL: [Self; 15] = [
        Self::Name,
        Self::Phone,
        Self::Address,
        Self::OrderDate,
        Self::GrossRevenue,
        Self::NetRevenue,
        Self::PaymentAmount,
        Self::RefundAmount,
        Self::RefundType,
        Self::RefundStatus,
        Self::OrderStatus,
        Self::Platform,
        Self::Category,
        Self::ItemName,
        Self::TrackingNumber,
    ];

    /// Accepted header names, most specific first.
    pub const fn aliases(self) -> &'static [&'static str] {
        match self {
            Self::Name => &["姓名", "客户名称", "顾客姓名", "name"],
            Self::Phone => &["手机号", "电话", "联系方式", "phone"],
            Self::Address => &["地址", "收货地址", "address"],
            Self::OrderDate => &[
                "顾客付款日期",
                "客户付款日期",
                "付款日期",
                "下单日期",
                "下单时间",
                "order_date",
            ],
            Self::GrossRevenue => &["收款额", "金额", "gross_revenue"],
            Self::NetRevenue => &["净收款", "net_revenue"],
            Self::PaymentAmount => &["打款金额", "打款", "打款价", "payment_amount"],
            Self::RefundAmount => &["退款金额", "refund_amount"],
            Self::RefundType => &["退款类型", "refund_type"],
            Self::RefundStatus => &["退货状态", "refund_status"],
            Self::OrderStatus => &["状态", "order_status"],
            Self::Platform => &["出售平台", "平台", "platform"],
            Self::Category => &["品类", "category"],
            Self::ItemName => &["货品名", "商品名称", "item_name"],
            Self::TrackingNumber => &["单号", "订单号", "出库单号", "出单号", "tracking_number"],
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::Phone => "phone",
            Self::Address => "address",
            Self::OrderDate => "order_date",
            Self::GrossRevenue => "gross_revenue",
            Self::NetRevenue => "net_revenue",
            Self::PaymentAmount => "payment_amount",
            Self::RefundAmount => "refund_amount",
            Self::RefundType => "refund_type",
            Self::RefundStatus => "refund_status",
            Self::OrderStatus => "order_status",
            Self::Platform => "platform",
            Self::Category => "category",
            Self::ItemName => "item_name",
            Self::TrackingNumber => "tracking_number",
        }
    }
}

impl fmt::Display for LedgerField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A data row that could not become an order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RejectedRow {
    pub line: u64,
    pub field: LedgerField,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ParsedLedger {
    pub orders: Vec<OrderRecord>,
    pub rejected: Vec<RejectedRow>,
    /// Non-blank data rows seen, accepted or not.
    pub total_rows: usize,
}

#[derive(Debug)]
pub(crate) enum ParseFailure {
    Csv(csv::Error),
    MissingColumn(LedgerField),
}

impl From<csv::Error> for ParseFailure {
    fn from(err: csv::Error) -> Self {
        Self::Csv(err)
    }
}

/// Column positions resolved from the header row; first matching alias wins.
#[derive(Debug)]
pub(crate) struct HeaderIndex {
    positions: [Option<usize>; 15],
}

impl HeaderIndex {
    pub(crate) fn resolve(headers: &csv::StringRecord) -> Self {
        let names: Vec<String> = headers
            .iter()
            .map(|header| clean_cell(header).unwrap_or_default().to_lowercase())
            .collect();
        let mut positions = [None; 15];
        for (slot, field) in LedgerField::ALL.into_iter().enumerate() {
            positions[slot] = field.aliases().iter().find_map(|alias| {
                names
                    .iter()
                    .position(|name| name.as_str() == alias.to_lowercase())
            });
        }
        Self { positions }
    }

    fn position(&self, field: LedgerField) -> Option<usize> {
        LedgerField::ALL
            .iter()
            .position(|candidate| *candidate == field)
            .and_then(|slot| self.positions[slot])
    }

    fn cell(&self, record: &csv::StringRecord, field: LedgerField) -> Option<String> {
        self.position(field)
            .and_then(|position| record.get(position))
            .and_then(clean_cell)
    }
}

pub(crate) fn parse_ledger<R: Read>(
    reader: R,
    reference_date: NaiveDate,
) -> Result<ParsedLedger, ParseFailure> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(reader);
    let index = HeaderIndex::resolve(csv_reader.headers()?);

    for required in [LedgerField::OrderDate, LedgerField::GrossRevenue] {
        if index.position(required).is_none() {
            return Err(ParseFailure::MissingColumn(required));
        }
    }

    let mut parsed = ParsedLedger::default();
    for record in csv_reader.records() {
        let record = record?;
        if record.iter().all(|cell| clean_cell(cell).is_none()) {
            continue;
        }
        parsed.total_rows += 1;
        let line = record.position().map(|position| position.line()).unwrap_or(0);

        match parse_row(&index, &record, reference_date) {
            Ok(order) => parsed.orders.push(order),
            Err((field, value)) => {
                warn!(line, %field, value = %value, "ledger row rejected");
                parsed.rejected.push(RejectedRow { line, field, value });
            }
        }
    }

    Ok(parsed)
}

fn parse_row(
    index: &HeaderIndex,
    record: &csv::StringRecord,
    reference_date: NaiveDate,
) -> Result<OrderRecord, (LedgerField, String)> {
    let cell = |field| index.cell(record, field);

    let raw_date = cell(LedgerField::OrderDate).unwrap_or_default();
    let order_date = parse_date(&raw_date, reference_date)
        .ok_or_else(|| (LedgerField::OrderDate, raw_date.clone()))?;

    let gross_revenue = match cell(LedgerField::GrossRevenue) {
        Some(raw) => parse_money(&raw).ok_or((LedgerField::GrossRevenue, raw))?,
        None => 0.0,
    };
    // Net receipts, when recorded, are what the customer actually paid.
    let gross_revenue = cell(LedgerField::NetRevenue)
        .and_then(|raw| parse_money(&raw))
        .filter(|net| *net != 0.0)
        .unwrap_or(gross_revenue);

    Ok(OrderRecord {
        phone: cell(LedgerField::Phone),
        name: cell(LedgerField::Name),
        address: cell(LedgerField::Address),
        order_date,
        gross_revenue,
        payment_amount: cell(LedgerField::PaymentAmount).and_then(|raw| parse_money(&raw)),
        refund_amount: cell(LedgerField::RefundAmount)
            .and_then(|raw| parse_money(&raw))
            .unwrap_or(0.0),
        refund_type: cell(LedgerField::RefundType),
        refund_status: cell(LedgerField::RefundStatus),
        order_status: cell(LedgerField::OrderStatus),
        platform: cell(LedgerField::Platform),
        category: cell(LedgerField::Category),
        item_name: cell(LedgerField::ItemName),
        tracking_number: cell(LedgerField::TrackingNumber),
    })
}
