//! Aliases command - inspect and edit the saved alias store.

use anyhow::Result;
use clap::{Args, Subcommand};
use console::Style;

use super::Context;

/// Arguments for the aliases command.
#[derive(Args, Debug)]
pub struct AliasesArgs {
    #[command(subcommand)]
    pub action: Option<AliasAction>,
}

#[derive(Subcommand, Debug)]
pub enum AliasAction {
    /// List all saved aliases (default)
    List,

    /// Save an alias, overwriting any existing one
    Save {
        /// The alias name
        name: String,
        /// The resource ID it resolves to
        id: String,
    },

    /// Remove a saved alias
    Remove {
        /// The alias name
        name: String,
    },
}

/// Run the aliases command.
pub async fn run(args: AliasesArgs, ctx: &Context) -> Result<()> {
    let store = super::open_store()?;
    let bold = Style::new().bold();
    let dim = Style::new().dim();

    match args.action.unwrap_or(AliasAction::List) {
        AliasAction::List => {
            let aliases = store.list()?;
            if aliases.is_empty() {
                println!("No aliases saved.");
                return Ok(());
            }
            for alias in aliases {
                print!("{} → {}", bold.apply_to(&alias.name), alias.id);
                if ctx.verbose {
                    print!(
                        "  {}",
                        dim.apply_to(format!("(updated {})", alias.updated_at.to_rfc3339()))
                    );
                }
                println!();
            }
        }
        AliasAction::Save { name, id } => {
            store.save(&name, &id)?;
            println!("Saved {} → {}", bold.apply_to(&name), id);
        }
        AliasAction::Remove { name } => {
            store.remove(&name)?;
            println!("Removed {}", bold.apply_to(&name));
        }
    }

    Ok(())
}
