//! Person form validated by property-triggered rules.
//!
//! Run with `RUST_LOG=nebula_rules=debug cargo run -p nebula-rules --example person`
//! to watch the manager schedule each rule.

use std::time::Duration;

use futures::FutureExt;
use nebula_rules::prelude::*;
use parking_lot::Mutex;
use tracing_subscriber::EnvFilter;

#[derive(Default)]
struct Person {
    first_name: Mutex<String>,
    last_name: Mutex<String>,
    full_name: Mutex<String>,
    age: Mutex<Option<u32>>,
    messages: PropertyMessages,
}

impl RuleTarget for Person {
    fn messages(&self) -> &PropertyMessages {
        &self.messages
    }
}

fn person_rules() -> RuleManager<Person> {
    let mut manager = RuleManager::new();

    manager.add(ConstraintRule::new(
        "FirstName",
        |p: &Person| p.first_name.lock().clone(),
        Required,
    ));
    manager.add(ConstraintRule::new(
        "LastName",
        |p: &Person| p.last_name.lock().clone(),
        Required,
    ));
    manager.add(
        ConstraintRule::new("Age", |p: &Person| *p.age.lock(), Range::new(0, 150))
            .with_message("Age must be realistic."),
    );

    manager.add(
        ActionRule::new(["FirstName", "LastName"], |p: &Person| {
            let full = format!("{} {}", p.first_name.lock(), p.last_name.lock());
            *p.full_name.lock() = full.trim().to_owned();
        })
        .named("FullName")
        .with_order(RuleOrder::FIRST),
    );

    manager.add(
        ValidationRule::new(["FirstName", "LastName"], |p: &Person| {
            let first = p.first_name.lock().clone();
            let same = !first.is_empty() && first == *p.last_name.lock();
            RuleMessages::new().when(same, "LastName", "Last name must differ from first name.")
        })
        .named("DistinctNames"),
    );

    manager.add(
        AsyncValidationRule::new(["LastName"], |p: &Person, token| {
            async move {
                tokio::select! {
                    () = tokio::time::sleep(Duration::from_millis(50)) => {}
                    () = token.cancelled() => return Err(RuleError::Cancelled),
                }
                let reserved = p.last_name.lock().eq_ignore_ascii_case("root");
                Ok(RuleMessages::new().when(reserved, "LastName", "This name is reserved."))
            }
            .boxed()
        })
        .named("ReservedName")
        .with_order(5),
    );

    manager
}

fn report(host: &RuleHost<Person>) {
    let person = host.target();
    tracing::info!(
        full_name = %person.full_name.lock(),
        valid = host.is_valid(),
        "validation state"
    );
    for property in person.messages.properties_with_messages() {
        for text in person.messages.texts_for(&property) {
            tracing::info!(%property, %text, "message");
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), RuleError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let host = RuleHost::new(Person::default(), person_rules());
    let token = CancellationToken::new();

    host.validate(&token).await?;
    report(&host);

    host.pause();
    *host.target().first_name.lock() = "Grace".into();
    *host.target().last_name.lock() = "Hopper".into();
    *host.target().age.lock() = Some(85);
    host.resume(&token).await?;
    report(&host);

    *host.target().last_name.lock() = "Grace".into();
    host.property_changed("LastName", &token).await?;
    report(&host);

    Ok(())
}
