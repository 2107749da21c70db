use std::path::Path;

use serde::{Deserialize, Serialize};

/// Category given to wallpapers synthesized from the local cache.
pub const CACHED_CATEGORY: &str = "cached";

/// Where an entry came from. Cached entries carry local paths in their URL fields.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Origin {
    #[default]
    Remote,
    Cached,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Wallpaper {
    pub id: String,
    /// Empty when the catalog offers no thumbnail; the preview shows details only.
    pub thumb_url: String,
    pub full_url: String,
    pub resolution: String,
    pub category: String,
    pub purity: String,
    pub file_type: String,
    #[serde(default)]
    pub origin: Origin,
}

impl Wallpaper {
    /// Build a wallpaper entry for a file already sitting in the full-image cache.
    pub fn from_cached_file(path: &Path) -> Self {
        let id = path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();
        let file_type = path
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy()))
            .unwrap_or_default();
        let location = path.to_string_lossy().to_string();
        Self {
            id,
            thumb_url: location.clone(),
            full_url: location,
            resolution: String::new(),
            category: CACHED_CATEGORY.into(),
            purity: "sfw".into(),
            file_type,
            origin: Origin::Cached,
        }
    }

    pub fn is_cached_entry(&self) -> bool {
        self.origin == Origin::Cached
    }

    /// Multi-line description used by the details panel.
    pub fn details(&self) -> String {
        [
            format!("ID: {}", self.id),
            format!("Resolution: {}", self.resolution),
            format!("Category: {}", self.category),
            format!("Purity: {}", self.purity),
            format!("Type: {}", self.file_type),
            format!("URL: {}", self.full_url),
        ]
        .join("\n")
    }

    /// One-line label used by result lists.
    pub fn summary(&self) -> String {
        format!(
            "{} • {} • {} • {}",
            self.id, self.resolution, self.category, self.purity
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageMeta {
    pub current_page: u32,
    pub last_page: u32,
    pub total: Option<u64>,
}

impl PageMeta {
    /// Build page bounds from what the catalog reported, falling back to the
    /// requested page and keeping `1 <= current_page <= last_page`.
    pub fn from_reported(
        requested: u32,
        current_page: Option<u32>,
        last_page: Option<u32>,
        total: Option<u64>,
    ) -> Self {
        let current_page = current_page.unwrap_or(requested).max(1);
        let last_page = last_page.unwrap_or(current_page).max(current_page);
        Self {
            current_page,
            last_page,
            total,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchPage {
    pub wallpapers: Vec<Wallpaper>,
    pub meta: PageMeta,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheKind {
    Thumbnail,
    Full,
}

/// Catalog content filter, encoded as the three-digit sfw/sketchy/nsfw bitmask
/// the search endpoint expects (`100`, `110`, `111`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u16", into = "u16")]
pub struct Purity(u16);

impl Purity {
    pub const SFW: Purity = Purity(100);
    pub const SFW_SKETCHY: Purity = Purity(110);
    pub const ALL: Purity = Purity(111);

    /// Accepts codes whose decimal digits are all 0 or 1, excluding `000`.
    pub fn new(code: u16) -> Option<Self> {
        let valid = code > 0
            && code <= 111
            && [code / 100, (code / 10) % 10, code % 10]
                .iter()
                .all(|d| *d <= 1);
        valid.then_some(Self(code))
    }

    pub fn code(self) -> u16 {
        self.0
    }

    pub fn as_query(self) -> String {
        format!("{:03}", self.0)
    }

    pub fn label(self) -> String {
        let names = [(100, "sfw"), (10, "sketchy"), (1, "nsfw")];
        names
            .iter()
            .filter(|(bit, _)| (self.0 / bit) % 10 == 1)
            .map(|(_, name)| *name)
            .collect::<Vec<_>>()
            .join("+")
    }
}

impl Default for Purity {
    fn default() -> Self {
        Self::SFW
    }
}

impl TryFrom<u16> for Purity {
    type Error = String;

    fn try_from(code: u16) -> std::result::Result<Self, Self::Error> {
        Self::new(code).ok_or_else(|| format!("invalid purity code: {code:03}"))
    }
}

impl From<Purity> for u16 {
    fn from(p: Purity) -> Self {
        p.0
    }
}

impl std::fmt::Display for Purity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.as_query())
    }
}

impl std::str::FromStr for Purity {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let code: u16 = s
            .trim()
            .parse()
            .map_err(|_| format!("invalid purity code: {s}"))?;
        Self::try_from(code)
    }
}

/// Transition table driving the "cycle purity filter" action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PurityCycle {
    transitions: Vec<(Purity, Purity)>,
}

impl PurityCycle {
    /// Close an ordered list of codes into a cycle. Duplicates are skipped and
    /// an empty list yields the default table.
    pub fn from_order(order: &[Purity]) -> Self {
        let mut unique: Vec<Purity> = Vec::new();
        for p in order {
            if !unique.contains(p) {
                unique.push(*p);
            }
        }
        if unique.is_empty() {
            return Self::default();
        }
        let transitions = unique
            .iter()
            .enumerate()
            .map(|(i, p)| (*p, unique[(i + 1) % unique.len()]))
            .collect();
        Self { transitions }
    }

    /// Next filter after `current`. Codes outside the table restart the cycle.
    pub fn next(&self, current: Purity) -> Purity {
        self.transitions
            .iter()
            .find(|(from, _)| *from == current)
            .map(|(_, to)| *to)
            .or_else(|| self.transitions.first().map(|(from, _)| *from))
            .unwrap_or_default()
    }

    pub fn transitions(&self) -> &[(Purity, Purity)] {
        &self.transitions
    }
}

impl Default for PurityCycle {
    fn default() -> Self {
        Self::from_order(&[Purity::SFW, Purity::SFW_SKETCHY, Purity::ALL])
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BackendType {
    Hyprpaper,
    Swww,
}

impl BackendType {
    pub const ALL: &[BackendType] = &[BackendType::Hyprpaper, BackendType::Swww];
}

impl std::fmt::Display for BackendType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Hyprpaper => write!(f, "hyprpaper"),
            Self::Swww => write!(f, "swww"),
        }
    }
}
