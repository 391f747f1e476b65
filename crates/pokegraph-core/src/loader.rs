use std::fs::{self, File};
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::{MoveRecord, SpeciesId, SpeciesRecord};

pub const TYPE_DELIMITER: char = ',';
pub const MOVE_COLUMNS: [&str; 4] = ["name", "description", "url", "pokemons"];

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed species JSON in {}: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("malformed move CSV in {}: {source}", path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    #[error("move CSV {} has no '{column}' column", path.display())]
    MissingColumn { path: PathBuf, column: &'static str },
    #[error(
        "species '{species}' in {} has invalid evolution number '{number}'",
        path.display()
    )]
    InvalidEvolution {
        path: PathBuf,
        species: String,
        number: String,
    },
    #[error(
        "move '{move_name}' in {} lists invalid species id '{token}'",
        path.display()
    )]
    InvalidSpeciesToken {
        path: PathBuf,
        move_name: String,
        token: String,
    },
}

#[derive(Debug, Deserialize)]
struct RawSpecies {
    id: SpeciesId,
    name: String,
    url: String,
    height: String,
    weight: String,
    types: String,
    #[serde(default)]
    evolution: Vec<RawEvolution>,
}

#[derive(Debug, Deserialize)]
struct RawEvolution {
    number: String,
}

#[derive(Debug, Deserialize)]
struct RawMove {
    name: String,
    description: String,
    url: String,
    pokemons: String,
}

pub fn load_species(path: impl AsRef<Path>) -> Result<Vec<SpeciesRecord>, LoadError> {
    let path = path.as_ref();
    let raw = fs::read_to_string(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let parsed: Vec<RawSpecies> =
        serde_json::from_str(&raw).map_err(|source| LoadError::Json {
            path: path.to_path_buf(),
            source,
        })?;

    parsed
        .into_iter()
        .map(|species| -> Result<SpeciesRecord, LoadError> {
            let evolutions = species
                .evolution
                .iter()
                .map(|evolution| {
                    parse_evolution_number(&evolution.number).ok_or_else(|| {
                        LoadError::InvalidEvolution {
                            path: path.to_path_buf(),
                            species: species.name.clone(),
                            number: evolution.number.clone(),
                        }
                    })
                })
                .collect::<Result<Vec<_>, _>>()?;

            Ok(SpeciesRecord {
                id: species.id,
                types: split_types(&species.types),
                name: species.name,
                url: species.url,
                height: species.height,
                weight: species.weight,
                evolutions,
            })
        })
        .collect()
}

pub fn load_moves(path: impl AsRef<Path>) -> Result<Vec<MoveRecord>, LoadError> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let csv_err = |source| LoadError::Csv {
        path: path.to_path_buf(),
        source,
    };

    let mut reader = csv::Reader::from_reader(file);
    let headers = reader.headers().map_err(csv_err)?.clone();
    for column in MOVE_COLUMNS {
        if !headers.iter().any(|header| header.trim() == column) {
            return Err(LoadError::MissingColumn {
                path: path.to_path_buf(),
                column,
            });
        }
    }

    let mut moves = Vec::new();
    for row in reader.deserialize::<RawMove>() {
        let row = row.map_err(csv_err)?;
        let species =
            parse_species_tokens(&row.pokemons).map_err(|token| LoadError::InvalidSpeciesToken {
                path: path.to_path_buf(),
                move_name: row.name.clone(),
                token,
            })?;
        moves.push(MoveRecord {
            name: row.name,
            description: row.description,
            url: row.url,
            species,
        });
    }

    Ok(moves)
}

/// Splits the delimited `types` field, keeping source order.
pub fn split_types(raw: &str) -> Vec<String> {
    raw.split(TYPE_DELIMITER).map(str::to_owned).collect()
}

/// Parses the species-id cell of a move row. Returns the offending token on failure.
pub fn parse_species_tokens(cell: &str) -> Result<Vec<SpeciesId>, String> {
    cell.split(|ch: char| ch == ',' || ch == ';' || ch.is_whitespace())
        .map(|token| token.trim_matches(|ch: char| matches!(ch, '[' | ']' | '"' | '\'' | '#')))
        .filter(|token| !token.is_empty())
        .map(|token| token.parse::<SpeciesId>().map_err(|_| token.to_owned()))
        .collect()
}

// "#002" -> 2
fn parse_evolution_number(number: &str) -> Option<SpeciesId> {
    let mut chars = number.chars();
    chars.next()?;
    chars.as_str().parse().ok()
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::tempdir;

    use super::*;

    const SPECIES_JSON: &str = r##"[
  {
    "id": 1,
    "name": "Bulbasaur",
    "url": "https://www.pokemon.com/us/pokedex/bulbasaur",
    "height": "0.7 m",
    "weight": "6.9 kg",
    "types": "Grass,Poison",
    "abilities": "Overgrow",
    "evolution": [{"number": "#002", "name": "Ivysaur"}, {"number": "#003"}]
  },
  {
    "id": 25,
    "name": "Pikachu",
    "url": "https://www.pokemon.com/us/pokedex/pikachu",
    "height": "0.4 m",
    "weight": "6.0 kg",
    "types": "Eletric",
    "evolution": []
  }
]"##;

    #[test]
    fn load_species_splits_types_and_strips_evolution_prefix() {
        let temp = tempdir().expect("tempdir");
        let path = temp.path().join("pokemon_data.json");
        fs::write(&path, SPECIES_JSON).expect("write species");

        let species = load_species(&path).expect("load species");
        assert_eq!(species.len(), 2);
        assert_eq!(species[0].types, vec!["Grass".to_owned(), "Poison".to_owned()]);
        assert_eq!(species[0].evolutions, vec![2, 3]);
        assert_eq!(species[0].weight, "6.9 kg");
        assert_eq!(species[1].types, vec!["Eletric".to_owned()]);
        assert!(species[1].evolutions.is_empty());
    }

    #[test]
    fn split_types_preserves_order_without_rewriting() {
        assert_eq!(split_types("Water,Flying"), vec!["Water", "Flying"]);
        assert_eq!(split_types("Flying,Water"), vec!["Flying", "Water"]);
        assert_eq!(split_types("Fire"), vec!["Fire"]);
    }

    #[test]
    fn load_species_fails_on_missing_or_malformed_file() {
        let temp = tempdir().expect("tempdir");

        let missing = load_species(temp.path().join("absent.json")).expect_err("missing file");
        assert!(matches!(missing, LoadError::Io { .. }));

        let path = temp.path().join("broken.json");
        fs::write(&path, "[{\"id\": \"one\"}]").expect("write broken species");
        let malformed = load_species(&path).expect_err("malformed json");
        assert!(matches!(malformed, LoadError::Json { .. }));
    }

    #[test]
    fn load_species_rejects_unparseable_evolution_number() {
        let temp = tempdir().expect("tempdir");
        let path = temp.path().join("pokemon_data.json");
        fs::write(
            &path,
            r##"[{"id": 4, "name": "Charmander", "url": "", "height": "0.6 m",
                "weight": "8.5 kg", "types": "Fire", "evolution": [{"number": "#"}]}]"##,
        )
        .expect("write species");

        let err = load_species(&path).expect_err("bad evolution number");
        match err {
            LoadError::InvalidEvolution {
                species, number, ..
            } => {
                assert_eq!(species, "Charmander");
                assert_eq!(number, "#");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn load_moves_reads_rows_and_species_tokens() {
        let temp = tempdir().expect("tempdir");
        let path = temp.path().join("moves.csv");
        fs::write(
            &path,
            "name,description,url,pokemons\n\
             Thunder Shock,\"A jolt of electricity, may paralyze.\",https://example.test/thunder-shock,\"[25, 26]\"\n\
             Splash,Does nothing.,https://example.test/splash,129\n\
             Struggle,Last resort.,https://example.test/struggle,\n",
        )
        .expect("write moves");

        let moves = load_moves(&path).expect("load moves");
        assert_eq!(moves.len(), 3);
        assert_eq!(moves[0].name, "Thunder Shock");
        assert_eq!(moves[0].description, "A jolt of electricity, may paralyze.");
        assert_eq!(moves[0].species, vec![25, 26]);
        assert_eq!(moves[1].species, vec![129]);
        assert!(moves[2].species.is_empty());
    }

    #[test]
    fn load_moves_requires_all_columns() {
        let temp = tempdir().expect("tempdir");
        let path = temp.path().join("moves.csv");
        fs::write(&path, "name,description,url\nSplash,Does nothing.,x\n").expect("write moves");

        let err = load_moves(&path).expect_err("missing column");
        assert!(matches!(
            err,
            LoadError::MissingColumn {
                column: "pokemons",
                ..
            }
        ));
    }

    #[test]
    fn parse_species_tokens_accepts_common_separators() {
        assert_eq!(parse_species_tokens("1,2,3"), Ok(vec![1, 2, 3]));
        assert_eq!(parse_species_tokens("[1, 2; 3]"), Ok(vec![1, 2, 3]));
        assert_eq!(parse_species_tokens("#025 #026"), Ok(vec![25, 26]));
        assert_eq!(parse_species_tokens("  "), Ok(Vec::new()));
        assert_eq!(parse_species_tokens("1,pikachu"), Err("pikachu".to_owned()));
    }
}
