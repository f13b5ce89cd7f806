use std::process;

use bookstall_core::PricingError;
use bookstall_resolve::adapter::SupabaseClient;
use bookstall_resolve::{PurchaseError, PurchaseOutcome, PurchaseSurface};
use time::OffsetDateTime;

use crate::config::BookstallConfig;
use crate::{print_json, report_error, runtime_or_exit, OutputFormat};

fn fail(err: PurchaseError, output: OutputFormat, quiet: bool) -> ! {
    let msg = format!("error: {} ({})", err.user_message(), err);
    report_error(&msg, output, quiet);
    process::exit(1);
}

pub(crate) fn cmd_purchase(
    config: &BookstallConfig,
    item_id: &str,
    quantity: i64,
    choices: &[(String, String)],
    output: OutputFormat,
    quiet: bool,
) {
    if quantity <= 0 {
        fail(PricingError::InvalidQuantity { quantity }.into(), output, quiet);
    }

    let client = SupabaseClient::new(&config.service, config.tables.clone());
    let rt = runtime_or_exit(output, quiet);

    let surface = match rt.block_on(PurchaseSurface::load(&client, item_id)) {
        Ok(s) => s,
        Err(e) => fail(e, output, quiet),
    };
    if let Err(e) = surface.change_quantity(quantity - 1) {
        fail(e.into(), output, quiet);
    }
    for (variation, option) in choices {
        if let Err(e) = surface.select_option(variation, option) {
            fail(e.into(), output, quiet);
        }
    }

    match rt.block_on(surface.submit(&client, OffsetDateTime::now_utc())) {
        Ok(PurchaseOutcome::Completed { receipt, total }) => {
            if quiet {
                return;
            }
            match output {
                OutputFormat::Json => print_json(&serde_json::json!({
                    "purchase_id": receipt.purchase_id,
                    "product_id": receipt.product_id,
                    "quantity": receipt.quantity,
                    "selection": surface.selection(),
                    "total": total,
                    "status": receipt.status,
                })),
                OutputFormat::Text => {
                    println!("Purchased {} x {}", receipt.quantity, surface.item().name);
                    println!("Total: {total}");
                    println!("Purchase ID: {}", receipt.purchase_id);
                }
            }
        }
        // The CLI never closes the surface.
        Ok(PurchaseOutcome::Discarded) => {}
        Err(e) => fail(e, output, quiet),
    }
}
