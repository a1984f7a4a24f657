use super::App;
use chrono::{DateTime, Local};
use clap::Subcommand;
use linkapp_core::session::{SaveSlot, SlotKind};

#[derive(Subcommand)]
pub enum SessionAction {
    /// List slots, newest first
    List {
        /// Only this kind (workspace or snapshot)
        #[arg(long, short)]
        kind: Option<SlotKind>,
        /// Show trashed slots instead
        #[arg(long, conflicts_with = "kind")]
        trash: bool,
    },
    /// Store a copy of the current document
    Save {
        #[arg(default_value = "")]
        name: String,
        /// Save as a snapshot instead of a workspace
        #[arg(long)]
        snapshot: bool,
    },
    Load { id: String },
    Rename { id: String, name: String },
    /// Move a slot to the trash
    Delete { id: String },
    /// Turn a snapshot into a new workspace and open it
    Restore {
        id: String,
        #[arg(default_value = "")]
        name: String,
    },
}

#[derive(Subcommand)]
pub enum SavesAction {
    List,
    /// Save under a name, overwriting a save with the same name
    Save { name: Option<String> },
    /// Open a save by name
    Open { name: String },
    /// Print the active save name
    Active,
}

fn print_slot(slot: &SaveSlot) {
    let updated = DateTime::from_timestamp_millis(slot.updated_at)
        .map(|at| at.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_default();
    let trashed = if slot.is_deleted() { "  (trash)" } else { "" };
    println!(
        "{:<9}  {}  {}  {}{trashed}",
        slot.kind.as_str(),
        updated,
        slot.id,
        slot.name
    );
}

pub fn session(app: &App, action: SessionAction) -> bool {
    let sessions = &app.sessions;
    match action {
        SessionAction::List { kind, trash } => {
            let slots = match kind {
                _ if trash => sessions.trash(),
                Some(kind) => sessions.list_by_kind(kind),
                None => sessions.list(),
            };
            slots.iter().for_each(print_slot);
            true
        }
        SessionAction::Save { name, snapshot } => {
            let kind = if snapshot {
                SlotKind::Snapshot
            } else {
                SlotKind::Workspace
            };
            match sessions.save(&name, kind) {
                Some(id) => {
                    println!("{id}");
                    true
                }
                None => false,
            }
        }
        SessionAction::Load { id } => sessions.load(&id),
        SessionAction::Rename { id, name } => sessions.rename(&id, &name),
        SessionAction::Delete { id } => sessions.delete(&id),
        SessionAction::Restore { id, name } => sessions.restore_to_workspace(&id, &name).is_some(),
    }
}

pub fn saves(app: &App, action: SavesAction) -> bool {
    let saves = app.sessions.saves();
    match action {
        SavesAction::List => {
            let active = saves.active_name();
            for slot in saves.list() {
                let marker = if slot.name_matches(&active) { "▶" } else { " " };
                println!("{marker} {}", slot.name);
            }
            true
        }
        SavesAction::Save { name: Some(name) } => saves.upsert(&name),
        SavesAction::Save { name: None } => {
            let saved = saves.save_active();
            if !saved {
                eprintln!("⚠️  No active save, pass a name");
            }
            saved
        }
        SavesAction::Open { name } => {
            let opened = saves.open_by_name(&name);
            if !opened {
                eprintln!("❌ No save named \"{name}\"");
            }
            opened
        }
        SavesAction::Active => {
            println!("{}", saves.active_name());
            true
        }
    }
}
