use std::fmt::Write;

use anyhow::Result;
use checkout_engine::{
    checkout_objects::{CompletedPurchase, InventoryStatus, PriceQuote},
    purchase_types::{Buyer, CatalogItem},
    CheckoutError,
    FailureKind,
};
use prettytable::{
    format::{LinePosition, LineSeparator, TableFormat},
    row,
    Table,
};

fn markdown_format() -> TableFormat {
    prettytable::format::FormatBuilder::new()
        .column_separator('|')
        .borders('|')
        .separator(LinePosition::Title, LineSeparator::new('-', '|', '|', '|'))
        .padding(1, 1)
        .build()
}

pub fn format_item(item: &CatalogItem) -> Result<String> {
    let mut table = Table::new();
    table.set_format(markdown_format());
    table.set_titles(row!["Item", "Name", "Category", "Price", "In stock", "Seller"]);
    table.add_row(row![item.id, item.name, item.category, item.unit_price, item.available, item.seller_email]);
    Ok(table.to_string())
}

pub fn format_quote(quote: &PriceQuote, verbose: bool) -> Result<String> {
    let mut f = String::new();
    if let Some(notice) = &quote.notice {
        writeln!(f, "⚠️ {notice}")?;
    }
    if verbose || quote.notice.is_some() {
        writeln!(f, "Quantity: {}", quote.quantity)?;
    }
    writeln!(f, "Total: {}", quote.total_price)?;
    Ok(f)
}

pub fn format_completed_purchase(purchase: &CompletedPurchase) -> Result<String> {
    let order = &purchase.order.order;
    let mut f = String::new();
    writeln!(f, "===============================================================================")?;
    writeln!(f, "Order {} placed", purchase.order.order_id)?;
    writeln!(f, "===============================================================================")?;
    let mut table = Table::new();
    table.set_format(markdown_format());
    table.set_titles(row!["Item", "Quantity", "Unit price", "Total", "Ship to", "Status", "Payment"]);
    table.add_row(row![
        order.item_id,
        order.quantity,
        order.unit_price,
        order.total_price,
        order.shipping_address,
        order.fulfilment_status,
        order.transaction_id
    ]);
    write!(f, "{table}")?;
    if let InventoryStatus::Discrepancy { reason } = &purchase.inventory {
        writeln!(f, "Note: the stock count for {} was not updated ({reason}).", order.item_id)?;
    }
    Ok(f)
}

pub fn format_buyer(buyer: Option<&Buyer>) -> Result<String> {
    let mut f = String::new();
    match buyer {
        Some(b) => {
            writeln!(f, "Signed in as {} <{}>", b.name, b.email)?;
            if let Some(url) = &b.avatar_url {
                writeln!(f, "Avatar: {url}")?;
            }
        },
        None => writeln!(f, "Not signed in")?,
    }
    Ok(f)
}

pub fn format_failure(error: &CheckoutError) -> Result<String> {
    let mut f = String::new();
    if error.kind() == FailureKind::OutcomeUnknown {
        let reference = error.transaction_id().map_or_else(|| "(none)".to_string(), |tx| tx.to_string());
        writeln!(f, "❌️ The payment processor did not say whether your card was charged. It may have been.")?;
        writeln!(f, "Do not try again. Contact support and quote payment reference {reference}.")?;
        writeln!(f, "Details: {error}")?;
        return Ok(f);
    }
    match error.transaction_id() {
        Some(tx) if error.kind() == FailureKind::ChargedNotRecorded => {
            writeln!(f, "❌️ Your card WAS charged, but the order was not recorded.")?;
            writeln!(f, "Do not try again. Contact support and quote payment reference {tx}.")?;
            writeln!(f, "Details: {error}")?;
        },
        Some(tx) => {
            writeln!(f, "❌️ {error}")?;
            writeln!(f, "Payment reference: {tx}")?;
        },
        None => {
            writeln!(f, "❌️ {error}")?;
            if error.is_retryable() {
                writeln!(f, "Nothing was charged. You can try again.")?;
            }
        },
    }
    Ok(f)
}
