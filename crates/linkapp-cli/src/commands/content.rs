use super::App;
use clap::Subcommand;
use linkapp_core::document::QuickAdd;

#[derive(Subcommand)]
pub enum PageAction {
    /// Append a page and switch to it
    Add,
    Rename { index: usize, name: String },
    Switch { index: usize },
    /// Move a page into the history
    Delete { index: usize },
    /// Drop page `from` in front of page `target`
    Move { from: usize, target: usize },
    /// Move the current page left (negative) or right
    Shift {
        #[arg(allow_hyphen_values = true)]
        delta: isize,
    },
}

#[derive(Subcommand)]
pub enum SectionAction {
    Add {
        title: Option<String>,
        #[arg(long, short)]
        page: Option<usize>,
    },
    Rename {
        id: String,
        text: String,
        #[arg(long, short)]
        page: Option<usize>,
    },
    Delete {
        id: String,
        #[arg(long, short)]
        page: Option<usize>,
    },
    /// Drop a section in front of position `target`
    Move {
        id: String,
        target: usize,
        #[arg(long, short)]
        page: Option<usize>,
    },
    Collapse {
        id: String,
        #[arg(long, short)]
        page: Option<usize>,
    },
    Expand {
        id: String,
        #[arg(long, short)]
        page: Option<usize>,
    },
    Toggle {
        id: String,
        #[arg(long, short)]
        page: Option<usize>,
    },
    /// Fold every section of a page
    CollapseAll {
        #[arg(long, short)]
        page: Option<usize>,
    },
    ExpandAll {
        #[arg(long, short)]
        page: Option<usize>,
    },
}

#[derive(Subcommand)]
pub enum ButtonAction {
    Add {
        section: String,
        text: String,
        #[arg(default_value = "")]
        href: String,
        #[arg(long, short)]
        page: Option<usize>,
    },
    Edit {
        section: String,
        id: String,
        text: String,
        #[arg(default_value = "")]
        href: String,
        #[arg(long, short)]
        page: Option<usize>,
    },
    Delete {
        section: String,
        id: String,
        #[arg(long, short)]
        page: Option<usize>,
    },
    /// Drop a link in front of position `target` of `to_section`
    Move {
        from_section: String,
        id: String,
        to_section: String,
        target: usize,
        #[arg(long, short)]
        page: Option<usize>,
    },
}

pub fn pages(app: &App) -> bool {
    let doc = app.store.get();
    for (index, page) in doc.pages.iter().enumerate() {
        let marker = if index == doc.current_page_index { "▶" } else { " " };
        println!(
            "{marker} {index}: {} ({}, {} sections)",
            page.name,
            page.id,
            page.sections.len()
        );
    }
    true
}

pub fn show(app: &App, page: Option<usize>) -> bool {
    let index = app.page(page);
    let doc = app.store.get();
    let Some(page) = doc.pages.get(index) else {
        eprintln!("❌ Page not found!");
        return false;
    };

    println!("📄 {} ({})  [{}/{}]", page.name, page.id, index + 1, doc.pages.len());
    for (id, section) in page.ordered_sections() {
        let fold = if section.collapsed.unwrap_or(false) { "▸" } else { "▾" };
        println!("  {fold} {} ({id})", section.text);
        if section.collapsed.unwrap_or(false) {
            continue;
        }
        for button in &section.buttons {
            if button.href.is_empty() {
                println!("      • {}  [{}]", button.text, button.id);
            } else {
                println!("      • {}  {}  [{}]", button.text, button.href, button.id);
            }
        }
    }
    true
}

pub fn page(app: &App, action: PageAction) -> bool {
    let content = &app.content;
    match action {
        PageAction::Add => content.add_page().is_some(),
        PageAction::Rename { index, name } => content.rename_page(index, &name),
        PageAction::Switch { index } => content.switch_page(index),
        PageAction::Delete { index } => content.delete_page(index),
        PageAction::Move { from, target } => content.move_page(from, target).is_some(),
        PageAction::Shift { delta } => {
            let moved = content.shift_current_page(delta);
            if !moved {
                eprintln!("⚠️  Page cannot move any further");
            }
            moved
        }
    }
}

pub fn section(app: &App, action: SectionAction) -> bool {
    let content = &app.content;
    match action {
        SectionAction::Add { title, page } => {
            match content.add_section(app.page(page), title.as_deref()) {
                Some(id) => {
                    println!("{id}");
                    true
                }
                None => false,
            }
        }
        SectionAction::Rename { id, text, page } => content.rename_section(app.page(page), &id, &text),
        SectionAction::Delete { id, page } => content.delete_section(app.page(page), &id),
        SectionAction::Move { id, target, page } => {
            content.move_section(app.page(page), &id, target).is_some()
        }
        SectionAction::Collapse { id, page } => content.set_collapsed(app.page(page), &id, true),
        SectionAction::Expand { id, page } => content.set_collapsed(app.page(page), &id, false),
        SectionAction::Toggle { id, page } => match content.toggle_collapsed(app.page(page), &id) {
            Some(collapsed) => {
                println!("{}", if collapsed { "collapsed" } else { "expanded" });
                true
            }
            None => false,
        },
        SectionAction::CollapseAll { page } => content.set_all_collapsed(app.page(page), true).is_some(),
        SectionAction::ExpandAll { page } => content.set_all_collapsed(app.page(page), false).is_some(),
    }
}

pub fn button(app: &App, action: ButtonAction) -> bool {
    let content = &app.content;
    match action {
        ButtonAction::Add {
            section,
            text,
            href,
            page,
        } => match content.add_button(app.page(page), &section, &text, &href) {
            Some(id) => {
                println!("{id}");
                true
            }
            None => false,
        },
        ButtonAction::Edit {
            section,
            id,
            text,
            href,
            page,
        } => content.edit_button(app.page(page), &section, &id, &text, &href),
        ButtonAction::Delete { section, id, page } => content.delete_button(app.page(page), &section, &id),
        ButtonAction::Move {
            from_section,
            id,
            to_section,
            target,
            page,
        } => content
            .move_button(app.page(page), &from_section, &id, &to_section, target)
            .is_some(),
    }
}

pub fn quick_add(app: &App, page: Option<usize>, href: &str, text: &str) -> bool {
    match app.content.quick_add_to_inbox(app.page(page), text, href) {
        Some(QuickAdd::Added { button_id, .. }) => {
            tracing::debug!(%button_id, "Quick-added link");
            true
        }
        // already there counts as done
        Some(QuickAdd::AlreadyPresent) => true,
        None => false,
    }
}
