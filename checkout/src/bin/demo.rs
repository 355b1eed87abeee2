//! Checkout walkthrough against the in-memory reservation service.
//!
//! Runs a paid checkout, a free checkout, and a hold that lapses on the
//! countdown. Session settings are read from the environment (`.env` is
//! honoured), see [`Config::from_env`].

use anyhow::Context;
use stagepass_checkout::metrics::register_checkout_metrics;
use stagepass_checkout::{
    Amount, CheckoutCoordinator, CompletionCallback, Config, EventId, EventListing,
    MockReservationService, SessionOutcome, Step, TicketType, TicketTypeId,
};
use stagepass_core::environment::{Clock, SystemClock};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn listing() -> EventListing {
    EventListing::new(
        EventId::new("evt-demo"),
        "Friday night jazz",
        vec![
            TicketType {
                id: TicketTypeId::new("community"),
                name: "Community".to_string(),
                price: Amount::ZERO,
            },
            TicketType {
                id: TicketTypeId::new("supporter"),
                name: "Supporter".to_string(),
                price: Amount::from_units(25),
            },
        ],
    )
}

fn print_outcome() -> CompletionCallback {
    Arc::new(|outcome| match outcome {
        SessionOutcome::Completed(confirmation) => {
            println!("  -> registration {} confirmed", confirmation.id);
        },
        SessionOutcome::Cancelled => println!("  -> checkout cancelled"),
    })
}

async fn paid_checkout(config: &Config, clock: Arc<dyn Clock>) -> anyhow::Result<()> {
    println!("\n=== Paid checkout ===");
    let service = MockReservationService::new(Arc::clone(&clock)).with_listing(&listing());
    let coordinator = CheckoutCoordinator::from_config(
        listing(),
        config,
        clock,
        Arc::new(service),
        print_outcome(),
    );

    coordinator
        .select_ticket(Some(TicketTypeId::new("supporter")), 2)
        .await?;
    let summary = coordinator.reserve().await?;
    let reservation = summary
        .reservation
        .context("reservation service returned no hold")?;
    println!(
        "Held {} x {} for {} (expires in {})",
        reservation.quantity,
        reservation
            .ticket_type_id
            .as_ref()
            .map_or("general admission", TicketTypeId::as_str),
        reservation.total_amount,
        summary.countdown.map(|c| c.to_string()).unwrap_or_default()
    );

    let payment = coordinator.proceed_to_payment().await?;
    if let Some(intent) = &payment.payment_intent {
        println!("Payment intent {} issued", intent.id);
    }

    let done = coordinator.finalize(None).await?;
    println!("Finished at step: {}", done.step);
    coordinator.shutdown().await?;
    Ok(())
}

async fn free_checkout(config: &Config, clock: Arc<dyn Clock>) -> anyhow::Result<()> {
    println!("\n=== Free checkout ===");
    let service = MockReservationService::new(Arc::clone(&clock)).with_listing(&listing());
    let coordinator = CheckoutCoordinator::from_config(
        listing(),
        config,
        clock,
        Arc::new(service),
        print_outcome(),
    );

    coordinator
        .select_ticket(Some(TicketTypeId::new("community")), 3)
        .await?;
    coordinator.reserve().await?;
    let done = coordinator.proceed_to_payment().await?;
    println!("Payment skipped, finished at step: {}", done.step);
    coordinator.shutdown().await?;
    Ok(())
}

async fn lapsed_hold(config: &Config, clock: Arc<dyn Clock>) -> anyhow::Result<()> {
    println!("\n=== Lapsed hold ===");
    let service = MockReservationService::new(Arc::clone(&clock))
        .with_listing(&listing())
        .with_hold_duration(chrono::Duration::seconds(3));
    let coordinator = CheckoutCoordinator::from_config(
        listing(),
        config,
        clock,
        Arc::new(service),
        print_outcome(),
    );

    coordinator
        .select_ticket(Some(TicketTypeId::new("supporter")), 1)
        .await?;
    coordinator.reserve().await?;
    println!("Waiting for the hold to lapse...");

    let tick = config.session.countdown_tick();
    tokio::time::timeout(Duration::from_secs(30), async {
        loop {
            tokio::time::sleep(tick).await;
            let snapshot = coordinator.snapshot().await;
            match snapshot.countdown {
                Some(countdown) => println!("  {countdown} left"),
                None if snapshot.step == Step::TicketSelection => break,
                None => {},
            }
        }
    })
    .await
    .context("hold never lapsed")?;

    let snapshot = coordinator.snapshot().await;
    if let Some(notice) = snapshot.notice {
        println!("{notice}");
    }
    println!("Back at step: {}", snapshot.step);

    coordinator.cancel_session().await?;
    coordinator.shutdown().await?;
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    let config = Config::from_env();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("stagepass_checkout={}", config.log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
    register_checkout_metrics();

    info!(
        countdown_tick_ms = config.session.countdown_tick_ms,
        shutdown_timeout = config.session.shutdown_timeout,
        "Starting checkout demo"
    );

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    paid_checkout(&config, Arc::clone(&clock)).await?;
    free_checkout(&config, Arc::clone(&clock)).await?;
    lapsed_hold(&config, clock).await?;

    println!("\nDone.");
    Ok(())
}
