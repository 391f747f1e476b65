/// Attacking type → types it is strong against. Directed and asymmetric.
///
/// Type names follow the source data, including its `Eletric` spelling.
pub static TYPE_MATCHUPS: &[(&str, &[&str])] = &[
    ("Fighting", &["Normal", "Rock", "Steel", "Ice", "Dark"]),
    ("Flying", &["Fighting", "Bug", "Grass"]),
    ("Poison", &["Grass", "Fairy"]),
    ("Ground", &["Poison", "Rock", "Steel", "Fire", "Eletric"]),
    ("Rock", &["Flying", "Bug", "Fire"]),
    ("Bug", &["Grass", "Psychic", "Dark"]),
    ("Ghost", &["Ghost", "Psychic", "Dark"]),
    ("Steel", &["Rock", "Ice", "Fairy"]),
    ("Fire", &["Bug", "Steel", "Grass", "Ice"]),
    ("Water", &["Ground", "Rock", "Fire"]),
    ("Grass", &["Ground", "Rock", "Water"]),
    ("Eletric", &["Flying", "Water"]),
    ("Psychic", &["Fighting", "Poison"]),
    ("Ice", &["Flying", "Ground", "Grass", "Dragon"]),
    ("Dragon", &["Dragon"]),
    ("Dark", &["Ghost", "Psychic"]),
    ("Fairy", &["Fighting", "Dragon", "Dark"]),
];

pub fn strong_against(attacking: &str) -> &'static [&'static str] {
    TYPE_MATCHUPS
        .iter()
        .find(|(name, _)| *name == attacking)
        .map(|(_, targets)| *targets)
        .unwrap_or(&[])
}

/// Every `(attacking, defending)` pair in table order.
pub fn matchup_pairs() -> impl Iterator<Item = (&'static str, &'static str)> {
    TYPE_MATCHUPS.iter().flat_map(|(attacking, targets)| {
        targets.iter().map(move |defending| (*attacking, *defending))
    })
}
