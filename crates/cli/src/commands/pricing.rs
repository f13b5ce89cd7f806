use std::path::Path;
use std::process;

use bookstall_core::{
    change_quantity, price_breakdown, validate_and_compute_total, CatalogItem, PriceBreakdown,
    Selection,
};
use bookstall_storage::CatalogItemRecord;
use time::OffsetDateTime;

use crate::{print_json, report_error, OutputFormat, PricingArgs};

/// Read a product JSON file (the stored row shape) into a catalog item.
pub(crate) fn load_item(path: &Path, output: OutputFormat, quiet: bool) -> CatalogItem {
    let content = match std::fs::read_to_string(path) {
        Ok(s) => s,
        Err(e) => {
            let msg = format!("error reading file '{}': {}", path.display(), e);
            report_error(&msg, output, quiet);
            process::exit(1);
        }
    };
    let record: CatalogItemRecord = match serde_json::from_str(&content) {
        Ok(r) => r,
        Err(e) => {
            let msg = format!("error: invalid product JSON in {}: {}", path.display(), e);
            report_error(&msg, output, quiet);
            process::exit(1);
        }
    };
    match CatalogItem::from_record(&record) {
        Ok(item) => item,
        Err(e) => {
            report_error(&format!("error: {e}"), output, quiet);
            process::exit(1);
        }
    }
}

/// Defaults for every variation, overridden by `--select` choices.
pub(crate) fn build_selection(
    item: &CatalogItem,
    choices: &[(String, String)],
    output: OutputFormat,
    quiet: bool,
) -> Selection {
    let mut selection = Selection::defaults_for(item);
    for (variation, option) in choices {
        if let Err(e) = selection.select(item, variation, option) {
            report_error(&format!("error: {e}"), output, quiet);
            process::exit(1);
        }
    }
    selection
}

fn breakdown_or_exit(
    item: &CatalogItem,
    selection: &Selection,
    as_of: OffsetDateTime,
    output: OutputFormat,
    quiet: bool,
) -> PriceBreakdown {
    match price_breakdown(item, selection, as_of) {
        Ok(b) => b,
        Err(e) => {
            report_error(&format!("error: {e}"), output, quiet);
            process::exit(1);
        }
    }
}

fn breakdown_json(item: &CatalogItem, b: &PriceBreakdown) -> serde_json::Value {
    let adjustments: serde_json::Value = b
        .adjustments
        .iter()
        .map(|a| {
            serde_json::json!({
                "variation": a.variation,
                "option": a.option,
                "delta": a.delta,
            })
        })
        .collect();
    serde_json::json!({
        "item_id": item.id,
        "base": b.base,
        "sale_applied": b.sale_applied,
        "adjustments": adjustments,
        "unit_price": b.unit_price,
        "negative": b.is_negative(),
        "in_stock": item.is_in_stock(),
        "low_stock": item.is_low_stock(),
    })
}

fn print_breakdown_text(item: &CatalogItem, b: &PriceBreakdown) {
    println!("Item: {} ({})", item.name, item.id);
    if b.sale_applied {
        println!("Base: {} (sale)", b.base);
    } else {
        println!("Base: {}", b.base);
    }
    for a in &b.adjustments {
        let sign = if a.delta.is_sign_negative() { "" } else { "+" };
        println!("  {}={} {}{}", a.variation, a.option, sign, a.delta);
    }
    println!("Unit price: {}", b.unit_price);
    if b.is_negative() {
        println!("warning: unit price is negative; check the product configuration");
    }
    if !item.is_in_stock() {
        println!("Out of stock");
    } else if item.is_low_stock() {
        if let Some(left) = item.available_stock() {
            println!("Low stock: {left} left");
        }
    }
}

pub(crate) fn cmd_price(path: &Path, args: &PricingArgs, output: OutputFormat, quiet: bool) {
    let item = load_item(path, output, quiet);
    let selection = build_selection(&item, &args.select, output, quiet);
    let as_of = args.as_of.unwrap_or_else(OffsetDateTime::now_utc);
    let b = breakdown_or_exit(&item, &selection, as_of, output, quiet);

    if quiet {
        return;
    }
    match output {
        OutputFormat::Json => print_json(&breakdown_json(&item, &b)),
        OutputFormat::Text => print_breakdown_text(&item, &b),
    }
}

pub(crate) fn cmd_total(
    path: &Path,
    quantity: i64,
    args: &PricingArgs,
    output: OutputFormat,
    quiet: bool,
) {
    let item = load_item(path, output, quiet);
    let selection = build_selection(&item, &args.select, output, quiet);
    let as_of = args.as_of.unwrap_or_else(OffsetDateTime::now_utc);
    let b = breakdown_or_exit(&item, &selection, as_of, output, quiet);

    let total = match validate_and_compute_total(&item, quantity, &b.unit_price) {
        Ok(t) => t,
        Err(e) => {
            report_error(&format!("error: {e}"), output, quiet);
            process::exit(1);
        }
    };

    if quiet {
        return;
    }
    match output {
        OutputFormat::Json => {
            let mut json = breakdown_json(&item, &b);
            json["quantity"] = serde_json::json!(quantity);
            json["total"] = serde_json::json!(total);
            print_json(&json);
        }
        OutputFormat::Text => {
            print_breakdown_text(&item, &b);
            println!("Quantity: {quantity}");
            println!("Total: {total}");
        }
    }
}

pub(crate) fn cmd_quantity(
    path: &Path,
    current: u32,
    delta: i64,
    output: OutputFormat,
    quiet: bool,
) {
    let item = load_item(path, output, quiet);
    match change_quantity(current, delta, &item) {
        Ok(next) => {
            if quiet {
                return;
            }
            match output {
                OutputFormat::Json => print_json(&serde_json::json!({ "quantity": next })),
                OutputFormat::Text => println!("{next}"),
            }
        }
        Err(e) => {
            let msg = format!("error: {e} (quantity stays {current})");
            report_error(&msg, output, quiet);
            process::exit(1);
        }
    }
}
