//! Dropdown menu mini-language.
//!
//! Input declarations store their dropdown menus as line-oriented text:
//!
//! ```text
//! red
//! green=#00ff00
//! shades={
//! light=$_light
//! }
//! ~
//! ```
//!
//! - `key=value` maps a displayed key to the value it inserts.
//! - A bare `key` maps to itself; a bare `~` is a separator line.
//! - `key={` opens a submenu that the next `}` line closes.
//! - A `$_` prefix marks a translatable literal.
//! - Text starting `function (params) {` followed by a newline is a
//!   computed menu: a script body evaluated by the host each time the menu
//!   opens.
//! - `§_name` names a built-in menu provider (see [`SPECIAL_MENUS`]) or an
//!   extension-provided one (`ext_` prefix).
//!
//! The editor UI edits menus as a nested list of [`Choice`] values;
//! [`encode_choices`] and [`decode_choices`] convert between that list and
//! the text form.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Prefix of a special (provider-computed) menu name.
pub const SPECIAL_PREFIX: &str = "§_";

/// Prefix of a translatable literal.
pub const TRANSLATABLE_PREFIX: &str = "$_";

/// Prefix of an extension-provided menu.
pub const EXTENSION_PREFIX: &str = "ext_";

/// Separator key.
pub const SEPARATOR: &str = "~";

/// Built-in menu providers a declaration may name with `§_`.
pub const SPECIAL_MENUS: [&str; 24] = [
    "dynamicMenu",
    "messagesMenu",
    "messagesReceivedMenu",
    "objectsMenu",
    "costumesMenu",
    "soundsMenu",
    "getVarNamesDict",
    "pianoKeyboardMenu",
    "directionDialMenu",
    "destinationsMenu",
    "locationMenu",
    "typesMenu",
    "objectsMenuWithSelf",
    "clonablesMenu",
    "clonablesMenuWithTurtle",
    "collidablesMenu",
    "keysMenu",
    "gettablesMenu",
    "attributesMenu",
    "audioMenu",
    "scenesMenu",
    "primitivesMenu",
    "extensionsMenu",
    "inputSlotsMenu",
];

/// Ordered key -> entry mapping of a static menu.
pub type MenuItems = IndexMap<String, MenuEntry>;

/// One entry of a static menu.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MenuEntry {
    /// Inserts the given text.
    Value(String),
    /// Inserts the given text, localized by the host (written `$_text`).
    Translatable(String),
    /// Opens a nested menu.
    Submenu(MenuItems),
}

/// A parsed dropdown menu.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Menu {
    /// A built-in or extension menu provider, by name.
    Special(String),
    /// A menu computed by a script each time it opens.
    Computed { params: Vec<String>, body: String },
    /// A fixed menu.
    Static(MenuItems),
}

/// An item of the list form edited in the slot dialog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Choice {
    /// A key that maps to itself, or a `~` separator.
    Item(String),
    /// A key with an explicit value.
    Pair(String, ChoiceValue),
}

/// The value side of a [`Choice::Pair`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChoiceValue {
    Text(String),
    Submenu(Vec<Choice>),
}

/// Returns the provider name if `options` names a known special menu.
pub fn special_menu_name(options: &str) -> Option<&str> {
    let name = options.strip_prefix(SPECIAL_PREFIX)?;
    if SPECIAL_MENUS.contains(&name) || name.starts_with(EXTENSION_PREFIX) {
        Some(name)
    } else {
        None
    }
}

/// Interprets a declaration's encoded options. Empty options mean no menu.
///
/// Unknown `§_` names are not an error; they fall through to the static
/// parser and show up as a literal menu item.
pub fn parse_menu(options: &str) -> Option<Menu> {
    if options.is_empty() {
        return None;
    }
    if let Some(name) = special_menu_name(options) {
        return Some(Menu::Special(name.to_string()));
    }
    Some(parse_choices(options))
}

/// Parses the text form of a menu.
pub fn parse_choices(text: &str) -> Menu {
    if let Some((params, body)) = split_function_source(text) {
        return Menu::Computed { params, body };
    }

    let mut stack: Vec<(String, MenuItems)> = Vec::new();
    let mut current = MenuItems::new();

    for line in text.split('\n') {
        if line.is_empty() {
            continue;
        }
        let (key, value) = match line.split_once('=') {
            Some((key, value)) => (key, Some(value)),
            None => (line, None),
        };
        if key == "}" {
            // A stray closer at top level is ignored.
            if let Some((name, mut parent)) = stack.pop() {
                parent.insert(name, MenuEntry::Submenu(std::mem::take(&mut current)));
                current = parent;
            }
            continue;
        }
        match value {
            Some("{") => {
                stack.push((key.to_string(), std::mem::take(&mut current)));
            }
            Some(value) => {
                let entry = match value.strip_prefix(TRANSLATABLE_PREFIX) {
                    Some(text) if !text.is_empty() => MenuEntry::Translatable(text.to_string()),
                    _ => MenuEntry::Value(value.to_string()),
                };
                current.insert(key.to_string(), entry);
            }
            None if key == SEPARATOR => {
                let taken = current.keys().filter(|k| k.starts_with(SEPARATOR)).count();
                let unique = SEPARATOR.repeat(taken + 1);
                current.insert(unique.clone(), MenuEntry::Value(unique));
            }
            None => {
                current.insert(key.to_string(), MenuEntry::Value(key.to_string()));
            }
        }
    }

    // Unclosed submenus are closed at end of input.
    while let Some((name, mut parent)) = stack.pop() {
        parent.insert(name, MenuEntry::Submenu(std::mem::take(&mut current)));
        current = parent;
    }
    Menu::Static(current)
}

/// Splits `function (a, b) {\n...\n}` into its parameters and body lines.
fn split_function_source(text: &str) -> Option<(Vec<String>, String)> {
    let (first, _) = text.split_once('\n')?;
    let rest = first.strip_prefix("function")?.trim_start();
    let rest = rest.strip_prefix('(')?;
    let close = rest.rfind(')')?;
    if !rest[close + 1..].trim_start().starts_with('{') {
        return None;
    }
    let params = rest[..close]
        .split(',')
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty())
        .collect();
    let lines: Vec<&str> = text.split('\n').collect();
    let body = lines[1..lines.len().saturating_sub(1).max(1)].join("\n");
    Some((params, body))
}

/// Renders the list form as menu text.
pub fn encode_choices(choices: &[Choice]) -> String {
    choices
        .iter()
        .map(encode_choice)
        .collect::<Vec<_>>()
        .join("\n")
}

fn encode_choice(choice: &Choice) -> String {
    match choice {
        Choice::Item(key) => key.clone(),
        Choice::Pair(key, ChoiceValue::Text(value)) => format!("{key}={value}"),
        Choice::Pair(key, ChoiceValue::Submenu(items)) => {
            format!("{key}={{\n{}\n}}", encode_choices(items))
        }
    }
}

/// Converts parsed menu items back to the list form.
pub fn decode_choices(items: &MenuItems) -> Vec<Choice> {
    items
        .iter()
        .map(|(key, entry)| {
            if key.starts_with(SEPARATOR) {
                return Choice::Item(SEPARATOR.to_string());
            }
            match entry {
                MenuEntry::Submenu(sub) => {
                    Choice::Pair(key.clone(), ChoiceValue::Submenu(decode_choices(sub)))
                }
                MenuEntry::Translatable(text) => Choice::Pair(
                    key.clone(),
                    ChoiceValue::Text(format!("{TRANSLATABLE_PREFIX}{text}")),
                ),
                MenuEntry::Value(value) if value == key => Choice::Item(key.clone()),
                MenuEntry::Value(value) => {
                    Choice::Pair(key.clone(), ChoiceValue::Text(value.clone()))
                }
            }
        })
        .collect()
}

/// Collects the searchable words of a menu: static keys (nested included)
/// and special provider names. Separators and computed menus contribute
/// nothing.
pub fn menu_words(menu: &Menu) -> Vec<String> {
    fn collect(items: &MenuItems, out: &mut Vec<String>) {
        for (key, entry) in items {
            if key.starts_with(SEPARATOR) {
                continue;
            }
            let key = key.strip_prefix(TRANSLATABLE_PREFIX).unwrap_or(key);
            out.push(key.to_lowercase());
            if let MenuEntry::Submenu(sub) = entry {
                collect(sub, out);
            }
        }
    }

    let mut words = Vec::new();
    match menu {
        Menu::Special(name) => words.push(name.to_lowercase()),
        Menu::Computed { .. } => {}
        Menu::Static(items) => collect(items, &mut words),
    }
    words
}
