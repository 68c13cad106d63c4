use anyhow::{anyhow, Result};
use checkout_common::helpers::{parse_boolean_flag, parse_positive_usize};
use checkout_engine::{
    checkout_objects::{AuthorizationUpdate, CloseOutcome},
    events::{EventHandlers, EventHooks},
    purchase_types::{CardDetails, ItemId},
    CheckoutError,
    IdentityProvider,
    PaymentProcessor,
    PurchaseBackend,
    PurchaseCoordinator,
};
use dialoguer::{theme::ColorfulTheme, Confirm, Input, Password};
use log::*;
use storefront_tools::{BackendConfig, CardProcessorApi, ProcessorConfig, StorefrontApi};

use crate::{
    formatting::{format_completed_purchase, format_failure, format_item, format_quote},
    profile_manager::ProfileIdentity,
};

pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CliSettings {
    pub event_buffer_size: usize,
    pub verbose_notices: bool,
}

impl CliSettings {
    pub fn new_from_env_or_default() -> Self {
        let buffer_size = std::env::var("CHECKOUT_EVENT_BUFFER_SIZE").ok();
        Self::from_values(buffer_size, std::env::var("CHECKOUT_VERBOSE_NOTICES").ok())
    }

    fn from_values(buffer_size: Option<String>, verbose: Option<String>) -> Self {
        let event_buffer_size = parse_positive_usize(buffer_size, DEFAULT_EVENT_BUFFER_SIZE);
        let verbose_notices = parse_boolean_flag(verbose, false);
        Self { event_buffer_size, verbose_notices }
    }
}

#[derive(Debug, Clone)]
pub struct BuyParams {
    pub item: ItemId,
    pub quantity: Option<String>,
    pub address: Option<String>,
    pub card: Option<CardArgs>,
    pub assume_yes: bool,
}

#[derive(Debug, Clone)]
pub struct CardArgs {
    pub number: String,
    pub exp_month: u8,
    pub exp_year: u16,
    pub cvc: String,
}

impl From<CardArgs> for CardDetails {
    fn from(card: CardArgs) -> Self {
        CardDetails::new(card.number, card.exp_month, card.exp_year, card.cvc)
    }
}

pub async fn print_item(item_id: &ItemId) -> Result<()> {
    let api = StorefrontApi::new(BackendConfig::new_from_env_or_default())?;
    let item = api.fetch_item(item_id).await?;
    println!("{}", format_item(&item)?);
    Ok(())
}

/// Runs a complete checkout against the configured storefront and card processor.
pub async fn buy(params: BuyParams) -> Result<()> {
    let settings = CliSettings::new_from_env_or_default();
    let identity = ProfileIdentity::load_default()?;
    let backend = StorefrontApi::new(BackendConfig::new_from_env_or_default())?;
    let processor = CardProcessorApi::new(ProcessorConfig::new_from_env_or_default())?;

    let item = backend.fetch_item(&params.item).await?;
    println!("{}", format_item(&item)?);

    let handlers = EventHandlers::new(settings.event_buffer_size, notification_hooks(settings.verbose_notices));
    let producers = handlers.producers();
    let tasks = handlers.start_handlers();

    let result = match PurchaseCoordinator::open(backend, processor, &identity, &item, producers) {
        Ok(coordinator) => {
            let result = run_checkout(&coordinator, params, settings).await;
            let outcome = coordinator.close().await;
            debug!("🛒️ Checkout closed: {outcome:?}");
            if outcome == CloseOutcome::Deferred {
                println!("A payment is still being processed. Its outcome will be reported shortly.");
            }
            result
        },
        Err(e) => Err(e.into()),
    };
    // The coordinator (and its producers) are gone, so the handlers drain and finish.
    for task in tasks {
        if let Err(e) = task.await {
            warn!("📬️ An event handler task failed. {e}");
        }
    }
    result
}

async fn run_checkout<B, P>(
    coordinator: &PurchaseCoordinator<B, P>,
    params: BuyParams,
    settings: CliSettings,
) -> Result<()>
where
    B: PurchaseBackend,
    P: PaymentProcessor,
{
    let quantity = match params.quantity {
        Some(q) => q,
        None => Input::<String>::with_theme(&ColorfulTheme::default())
            .with_prompt("Quantity")
            .default("1".to_string())
            .interact_text()?,
    };
    let quote = coordinator.update_quantity_input(&quantity).await?;
    print!("{}", format_quote(&quote, settings.verbose_notices)?);

    let address = match params.address {
        Some(a) => a,
        None => Input::<String>::with_theme(&ColorfulTheme::default())
            .with_prompt("Shipping address")
            .interact_text()?,
    };
    coordinator.set_shipping_address(address).await?;

    match coordinator.authorize().await? {
        AuthorizationUpdate::Ready(_) => debug!("🔑️ Payment authorization received"),
        AuthorizationUpdate::Superseded => return Err(anyhow!("The payment authorization was superseded")),
    }

    let mut card = match params.card {
        Some(c) => c.into(),
        None => prompt_for_card()?,
    };
    if !params.assume_yes && !confirm(&format!("Pay {} for {} unit(s)?", quote.total_price, quote.quantity))? {
        println!("Checkout cancelled. Nothing was charged.");
        return Ok(());
    }

    let mut expired_retries = 0;
    loop {
        match coordinator.submit(Some(card.clone())).await {
            Ok(purchase) => {
                print!("{}", format_completed_purchase(&purchase)?);
                return Ok(());
            },
            // A fresh authorization has already been requested
            Err(CheckoutError::AuthorizationExpired) if expired_retries == 0 => {
                expired_retries += 1;
                info!("🔑️ Authorization expired. Retrying with the new authorization.");
            },
            Err(e) => {
                print!("{}", format_failure(&e)?);
                if params.assume_yes || !e.is_retryable() || !confirm("Try again with a different card?")? {
                    return Err(e.into());
                }
                card = prompt_for_card()?;
            },
        }
    }
}

fn notification_hooks(verbose: bool) -> EventHooks {
    let mut hooks = EventHooks::default();
    hooks
        .on_purchase_completed(move |ev| {
            Box::pin(async move {
                info!("📬️ Order {} completed at {}", ev.purchase.order.order_id, ev.completed_at);
                if verbose {
                    println!("📬️ Order {} confirmed.", ev.purchase.order.order_id);
                }
            })
        })
        .on_purchase_failed(move |ev| {
            Box::pin(async move {
                warn!("📬️ Purchase of {} failed ({}): {}", ev.item_id, ev.kind, ev.detail);
                if let Some(tx) = ev.transaction_id {
                    error!("📬️ Payment {tx} for {} needs to be reconciled", ev.item_id);
                }
            })
        })
        .on_inventory_discrepancy(move |ev| {
            Box::pin(async move {
                warn!(
                    "📬️ Stock for {} was not reduced by {} after order {}. {}",
                    ev.item_id, ev.quantity, ev.order_id, ev.reason
                );
            })
        });
    hooks
}

fn prompt_for_card() -> Result<CardDetails> {
    let theme = ColorfulTheme::default();
    let number = Password::with_theme(&theme).with_prompt("Card number").interact()?;
    let exp_month = Input::<u8>::with_theme(&theme).with_prompt("Expiry month").interact_text()?;
    let exp_year = Input::<u16>::with_theme(&theme).with_prompt("Expiry year").interact_text()?;
    let cvc = Password::with_theme(&theme).with_prompt("CVC").interact()?;
    Ok(CardDetails::new(number, exp_month, exp_year, cvc))
}

fn confirm(prompt: &str) -> Result<bool> {
    Ok(Confirm::with_theme(&ColorfulTheme::default()).with_prompt(prompt).default(false).interact()?)
}
