//! Spending and income categories with the keyword lookup table

use super::TransactionKind;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Food,
    Transport,
    Shopping,
    Bills,
    Entertainment,
    Health,
    Education,
    Salary,
    Business,
    Gift,
    Investment,
    Others,
}

/// Static keyword table with zero allocation. First hit in table order wins.
const KEYWORDS: &[(&str, Category)] = &[
    // Food & drink
    ("makan", Category::Food),
    ("makanan", Category::Food),
    ("kopi", Category::Food),
    ("nasi", Category::Food),
    ("minum", Category::Food),
    ("minuman", Category::Food),
    ("jajan", Category::Food),
    ("snack", Category::Food),
    ("sarapan", Category::Food),
    ("bakso", Category::Food),
    ("mie", Category::Food),
    ("roti", Category::Food),
    ("teh", Category::Food),
    ("gorengan", Category::Food),
    ("resto", Category::Food),
    ("restoran", Category::Food),
    ("kafe", Category::Food),
    ("cafe", Category::Food),
    ("sayur", Category::Food),
    ("beras", Category::Food),
    // Transport
    ("bensin", Category::Transport),
    ("bbm", Category::Transport),
    ("pertalite", Category::Transport),
    ("grab", Category::Transport),
    ("gojek", Category::Transport),
    ("ojek", Category::Transport),
    ("ojol", Category::Transport),
    ("parkir", Category::Transport),
    ("tol", Category::Transport),
    ("taksi", Category::Transport),
    ("taxi", Category::Transport),
    ("kereta", Category::Transport),
    ("krl", Category::Transport),
    ("bus", Category::Transport),
    ("transport", Category::Transport),
    ("transportasi", Category::Transport),
    // Shopping
    ("baju", Category::Shopping),
    ("celana", Category::Shopping),
    ("sepatu", Category::Shopping),
    ("tas", Category::Shopping),
    ("belanja", Category::Shopping),
    ("shopee", Category::Shopping),
    ("tokopedia", Category::Shopping),
    ("skincare", Category::Shopping),
    // Bills
    ("listrik", Category::Bills),
    ("pln", Category::Bills),
    ("pdam", Category::Bills),
    ("tagihan", Category::Bills),
    ("pulsa", Category::Bills),
    ("kuota", Category::Bills),
    ("internet", Category::Bills),
    ("wifi", Category::Bills),
    ("bpjs", Category::Bills),
    ("kos", Category::Bills),
    ("kost", Category::Bills),
    ("sewa", Category::Bills),
    ("cicilan", Category::Bills),
    ("asuransi", Category::Bills),
    // Entertainment
    ("nonton", Category::Entertainment),
    ("bioskop", Category::Entertainment),
    ("netflix", Category::Entertainment),
    ("spotify", Category::Entertainment),
    ("game", Category::Entertainment),
    ("hiburan", Category::Entertainment),
    ("liburan", Category::Entertainment),
    ("karaoke", Category::Entertainment),
    // Health
    ("obat", Category::Health),
    ("dokter", Category::Health),
    ("apotek", Category::Health),
    ("klinik", Category::Health),
    ("rumah sakit", Category::Health),
    ("vitamin", Category::Health),
    ("kesehatan", Category::Health),
    // Education
    ("buku", Category::Education),
    ("kursus", Category::Education),
    ("sekolah", Category::Education),
    ("kuliah", Category::Education),
    ("spp", Category::Education),
    ("les", Category::Education),
    ("pendidikan", Category::Education),
    // Income
    ("gaji", Category::Salary),
    ("gajian", Category::Salary),
    ("salary", Category::Salary),
    ("upah", Category::Salary),
    ("thr", Category::Salary),
    ("jualan", Category::Business),
    ("jual", Category::Business),
    ("dagang", Category::Business),
    ("usaha", Category::Business),
    ("omzet", Category::Business),
    ("freelance", Category::Business),
    ("proyek", Category::Business),
    ("hadiah", Category::Gift),
    ("kado", Category::Gift),
    ("dikasih", Category::Gift),
    ("angpao", Category::Gift),
    ("dividen", Category::Investment),
    ("bunga", Category::Investment),
    ("investasi", Category::Investment),
    ("saham", Category::Investment),
];

impl Category {
    pub const ALL: &'static [Category] = &[
        Category::Food,
        Category::Transport,
        Category::Shopping,
        Category::Bills,
        Category::Entertainment,
        Category::Health,
        Category::Education,
        Category::Salary,
        Category::Business,
        Category::Gift,
        Category::Investment,
        Category::Others,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Food => "food",
            Category::Transport => "transport",
            Category::Shopping => "shopping",
            Category::Bills => "bills",
            Category::Entertainment => "entertainment",
            Category::Health => "health",
            Category::Education => "education",
            Category::Salary => "salary",
            Category::Business => "business",
            Category::Gift => "gift",
            Category::Investment => "investment",
            Category::Others => "others",
        }
    }

    pub fn ids() -> Vec<String> {
        Self::ALL.iter().map(|c| c.as_str().to_string()).collect()
    }

    /// Whether the category can label a transaction of this kind
    pub fn applies_to(&self, kind: TransactionKind) -> bool {
        let income = matches!(
            self,
            Category::Salary | Category::Business | Category::Gift | Category::Investment
        );

        match kind {
            TransactionKind::Income => income || *self == Category::Others,
            TransactionKind::Expense => !income,
        }
    }

    /// Keyword lookup restricted to categories valid for `kind`
    pub fn infer(text: &str, kind: TransactionKind) -> Option<Category> {
        let lowered = text.to_lowercase();
        let words: Vec<&str> = lowered
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .collect();

        KEYWORDS
            .iter()
            .filter(|(_, category)| category.applies_to(kind))
            .find(|(keyword, _)| {
                if keyword.contains(' ') {
                    lowered.contains(keyword)
                } else {
                    words.contains(keyword)
                }
            })
            .map(|(_, category)| *category)
    }

    /// Lookup with the `others` default
    pub fn infer_or_default(text: &str, kind: TransactionKind) -> Category {
        Self::infer(text, kind).unwrap_or(Category::Others)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
