use super::App;
use clap::{Subcommand, ValueEnum};
use linkapp_application::RestoreStrategy;
use linkapp_core::document::{DeletedItem, HistoryEntry};

#[derive(Clone, Copy, ValueEnum)]
pub enum Strategy {
    /// Original page and section, when they still exist
    Auto,
    /// Recreate missing page/section
    Recreate,
    /// Into the "Restored" page
    Restored,
}

impl From<Strategy> for RestoreStrategy {
    fn from(strategy: Strategy) -> Self {
        match strategy {
            Strategy::Auto => Self::Auto,
            Strategy::Recreate => Self::RecreateParents,
            Strategy::Restored => Self::ToRestored,
        }
    }
}

#[derive(Subcommand)]
pub enum HistoryAction {
    /// List deleted items, newest last
    List,
    /// Put a deleted item back
    Restore {
        index: usize,
        #[arg(long, short, value_enum, default_value = "auto")]
        strategy: Strategy,
    },
    /// Forget one item for good
    Delete { index: usize },
    Clear,
    /// Apply the 30 day / 200 item limits now
    Prune,
}

fn describe(entry: &HistoryEntry) -> String {
    let from = [entry.page_name.as_deref(), entry.section_name.as_deref()]
        .into_iter()
        .flatten()
        .collect::<Vec<_>>()
        .join(" / ");
    match &entry.item {
        DeletedItem::Button { name, link } if link.is_empty() => format!("button \"{name}\" from {from}"),
        DeletedItem::Button { name, link } => format!("button \"{name}\" <{link}> from {from}"),
        DeletedItem::Section { buttons } => format!("section \"{from}\" with {} links", buttons.len()),
        DeletedItem::Page { snapshot } => {
            let name = snapshot
                .as_ref()
                .map(|p| p.name.as_str())
                .or(entry.page_name.as_deref())
                .unwrap_or("?");
            format!("page \"{name}\"")
        }
        DeletedItem::Unknown { kind, .. } => format!("unknown item \"{kind}\""),
    }
}

pub fn run(app: &App, action: HistoryAction) -> bool {
    let history = &app.history;
    match action {
        HistoryAction::List => {
            let entries = history.entries();
            if entries.is_empty() {
                println!("History is empty");
            }
            for (index, entry) in entries.iter().enumerate() {
                let when = entry
                    .deleted_at
                    .as_ref()
                    .and_then(|at| at.timestamp_millis())
                    .and_then(chrono::DateTime::from_timestamp_millis)
                    .map(|at| at.with_timezone(&chrono::Local).format("%Y-%m-%d %H:%M").to_string())
                    .unwrap_or_else(|| "-".to_string());
                println!("{index:>3}  {when}  {}", describe(entry));
            }
            true
        }
        HistoryAction::Restore { index, strategy } => history.restore(index, strategy.into()).is_some(),
        HistoryAction::Delete { index } => {
            let removed = history.delete_entry(index);
            if !removed {
                eprintln!("❌ Item not found in history!");
            }
            removed
        }
        HistoryAction::Clear => history.clear(),
        HistoryAction::Prune => {
            let pruned = history.prune();
            println!("Pruned {pruned} item(s)");
            true
        }
    }
}
