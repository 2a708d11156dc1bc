//! Deterministic mock data engine.
//!
//! Stands in for the backend with reproducible, query-sensitive synthetic
//! datasets. The same seed always reproduces the same rows byte for byte,
//! so drilldown pagination, sorting and merge semantics can be exercised
//! without a live server. Seeds come from hashing the entity id plus the
//! canonical query, so changing any filter changes the dataset.

use chrono::DateTime;

use crate::types::{ListPage, Paging, Row};

// ---------------------------------------------------------------------------
// Seeding
// ---------------------------------------------------------------------------

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// FNV-1a hash of an arbitrary key string. Identical inputs always yield
/// identical seeds.
pub fn seed_for(key: &str) -> u64 {
    let mut hash = FNV_OFFSET;
    for byte in key.as_bytes() {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

/// Deterministic per-seed dataset size in `[24, 104)`, so distinct queries
/// diverge but each one is stable.
pub fn dataset_size(seed: u64) -> usize {
    24 + (seed % 80) as usize
}

// Splitmix-style scrambler: one value per (seed, index, salt) triple.
fn scramble(seed: u64, index: u64, salt: u64) -> u64 {
    let mut z = seed
        .wrapping_add(index.wrapping_mul(0x9e37_79b9_7f4a_7c15))
        .wrapping_add(salt.wrapping_mul(0xbf58_476d_1ce4_e5b9));
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    z ^ (z >> 31)
}

// ---------------------------------------------------------------------------
// Row generation
// ---------------------------------------------------------------------------

const FIRST_WORDS: [&str; 12] = [
    "Acme", "Borealis", "Cobalt", "Delta", "Evergreen", "Fathom", "Granite", "Harbor", "Iris",
    "Juniper", "Koto", "Lumen",
];

const SECOND_WORDS: [&str; 10] = [
    "Media", "Brands", "Group", "Labs", "Partners", "Collective", "Works", "Digital", "Studio",
    "Holdings",
];

const CITIES: [&str; 8] = [
    "Berlin", "Hamburg", "Munich", "Cologne", "Leipzig", "Dresden", "Stuttgart", "Bremen",
];

const STATUSES: [&str; 4] = ["active", "pending", "paused", "overdue"];

/// Generate `total` synthetic rows fully determined by `(seed, index)`.
pub fn generate_rows(seed: u64, total: usize) -> Vec<Row> {
    (0..total as u64).map(|idx| generate_row(seed, idx)).collect()
}

fn generate_row(seed: u64, idx: u64) -> Row {
    let first = FIRST_WORDS[(scramble(seed, idx, 1) % FIRST_WORDS.len() as u64) as usize];
    let second = SECOND_WORDS[(scramble(seed, idx, 2) % SECOND_WORDS.len() as u64) as usize];
    let city = CITIES[(scramble(seed, idx, 3) % CITIES.len() as u64) as usize];
    let status = STATUSES[(scramble(seed, idx, 4) % STATUSES.len() as u64) as usize];
    let amount_cents = 5_000 + (scramble(seed, idx, 5) % 2_000_000) as i64;

    // Timestamps spread over roughly the trailing year, anchored to a fixed
    // epoch so generation stays independent of wall-clock time.
    let anchor_secs: i64 = 1_767_225_600; // 2026-01-01T00:00:00Z
    let offset_secs = (scramble(seed, idx, 6) % 31_536_000) as i64;
    let last_active = DateTime::from_timestamp(anchor_secs - offset_secs, 0)
        .map(|dt| dt.to_rfc3339())
        .unwrap_or_default();

    let mut fields = std::collections::BTreeMap::new();
    fields.insert(
        "bookings".to_string(),
        serde_json::Value::from(1 + scramble(seed, idx, 7) % 40),
    );
    fields.insert("lastActive".to_string(), serde_json::Value::from(last_active));

    Row {
        id: format!("row-{seed:08x}-{idx}"),
        title: format!("{first} {second}"),
        subtitle: Some(city.to_string()),
        amount_cents: Some(amount_cents),
        status: Some(status.to_string()),
        fields,
    }
}

// ---------------------------------------------------------------------------
// Sorting
// ---------------------------------------------------------------------------

/// Sort direction for list endpoints.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDir {
    #[default]
    Asc,
    Desc,
}

impl SortDir {
    pub fn flipped(self) -> Self {
        match self {
            Self::Asc => Self::Desc,
            Self::Desc => Self::Asc,
        }
    }

    pub fn wire_value(self) -> &'static str {
        match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        }
    }
}

/// Sort rows in place by an arbitrary field.
///
/// Comparison ladder: numeric when both values parse as numbers, then
/// timestamp when both parse as RFC 3339, otherwise case-insensitive
/// lexicographic. Direction flips the comparator sign.
pub fn sort_rows(rows: &mut [Row], sort_by: &str, dir: SortDir) {
    rows.sort_by(|a, b| {
        let ord = compare_values(&a.field_text(sort_by), &b.field_text(sort_by));
        match dir {
            SortDir::Asc => ord,
            SortDir::Desc => ord.reverse(),
        }
    });
}

fn compare_values(a: &str, b: &str) -> std::cmp::Ordering {
    if let (Ok(na), Ok(nb)) = (a.parse::<f64>(), b.parse::<f64>()) {
        return na.partial_cmp(&nb).unwrap_or(std::cmp::Ordering::Equal);
    }
    if let (Ok(ta), Ok(tb)) = (
        DateTime::parse_from_rfc3339(a),
        DateTime::parse_from_rfc3339(b),
    ) {
        return ta.cmp(&tb);
    }
    a.to_lowercase().cmp(&b.to_lowercase())
}

// ---------------------------------------------------------------------------
// Pagination
// ---------------------------------------------------------------------------

/// Slice one page out of a sorted dataset. The cursor is the decimal row
/// offset; a malformed cursor reads as the first page.
pub fn paginate(rows: &[Row], cursor: Option<&str>, limit: usize) -> ListPage {
    let offset = cursor
        .and_then(|c| c.parse::<usize>().ok())
        .unwrap_or(0)
        .min(rows.len());
    let end = (offset + limit).min(rows.len());
    let next_cursor = (end < rows.len()).then(|| end.to_string());
    ListPage {
        rows: rows[offset..end].to_vec(),
        paging: Some(Paging {
            has_more: next_cursor.is_some(),
            next_cursor,
            cursor: None,
        }),
    }
}
