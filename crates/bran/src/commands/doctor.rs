//! Doctor command - configuration and environment checks.

use anyhow::Result;
use clap::Args;
use console::Style;

use super::Context;

/// Arguments for the doctor command.
#[derive(Args, Debug)]
pub struct DoctorArgs {}

struct Check {
    name: &'static str,
    ok: bool,
    detail: String,
}

/// Run the doctor command.
pub async fn run(_args: DoctorArgs, _ctx: &Context) -> Result<()> {
    let green = Style::new().green();
    let red = Style::new().red();

    let mut checks = Vec::new();

    checks.push(Check {
        name: "Anthropic API key",
        ok: std::env::var("ANTHROPIC_API_KEY").map(|v| !v.is_empty()) == Ok(true),
        detail: "ANTHROPIC_API_KEY".to_string(),
    });

    let config_path = bran_config::config_path();
    checks.push(Check {
        name: "Config file",
        ok: config_path.as_ref().map(|p| p.exists()).unwrap_or(false),
        detail: config_path
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "no config directory".to_string()),
    });

    match bran_config::Config::discover() {
        Ok(config) => {
            checks.push(Check {
                name: "Warehouse account",
                ok: !config.warehouse.account.is_empty(),
                detail: "warehouse.account / WAREHOUSE_ACCOUNT".to_string(),
            });
            checks.push(Check {
                name: "Email sender",
                ok: config.sender_address().is_ok(),
                detail: "smtp.from_email / SMTP_FROM_EMAIL".to_string(),
            });
        }
        Err(e) => checks.push(Check {
            name: "Config parse",
            ok: false,
            detail: e.to_string(),
        }),
    }

    let alias_check = super::open_store().and_then(|store| Ok(store.len()?));
    checks.push(Check {
        name: "Alias store",
        ok: alias_check.is_ok(),
        detail: match &alias_check {
            Ok(count) => format!("{} ({} aliases)", super::alias_db_path().display(), count),
            Err(e) => e.to_string(),
        },
    });

    let mut failures = 0;
    for check in &checks {
        let mark = if check.ok {
            green.apply_to("✓")
        } else {
            failures += 1;
            red.apply_to("✗")
        };
        println!("{} {:<20} {}", mark, check.name, check.detail);
    }

    if failures > 0 {
        println!();
        println!("{} check(s) failed.", failures);
        std::process::exit(1);
    }

    println!();
    println!("All checks passed.");
    Ok(())
}
