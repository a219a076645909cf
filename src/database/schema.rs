//! Database schema definitions
//!
//! The video-rental catalog is a fixed, ordered list of table definitions.
//! Forward order is dependency-safe for creation (every table appears after
//! the tables it references) and its reverse is safe for dropping.
//!
//! Identifiers are always double-quoted so their case is preserved exactly
//! as declared. DDL is rendered per dialect because DuckDB does not support
//! cascading foreign key actions.

use super::WriteMode;

/// SQL dialect used to render statements
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlDialect {
    DuckDB,
    Postgres,
}

/// Declared column type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Varchar(u16),
    /// Unbounded text (biographies, synopses)
    Clob,
    Integer,
    Decimal { precision: u8, scale: u8 },
    Date,
}

impl ColumnType {
    /// Render the type for a dialect
    pub fn sql(&self, dialect: SqlDialect) -> String {
        match (self, dialect) {
            (ColumnType::Varchar(len), _) => format!("VARCHAR({})", len),
            (ColumnType::Clob, _) => "TEXT".to_string(),
            (ColumnType::Integer, _) => "BIGINT".to_string(),
            (ColumnType::Decimal { precision, scale }, SqlDialect::DuckDB) => {
                format!("DECIMAL({}, {})", precision, scale)
            }
            (ColumnType::Decimal { precision, scale }, SqlDialect::Postgres) => {
                format!("NUMERIC({}, {})", precision, scale)
            }
            (ColumnType::Date, _) => "DATE".to_string(),
        }
    }
}

/// Column definition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnDef {
    pub name: &'static str,
    pub column_type: ColumnType,
    /// NOT NULL
    pub required: bool,
    /// UNIQUE (outside the primary key)
    pub unique: bool,
}

impl ColumnDef {
    /// A nullable column
    pub const fn new(name: &'static str, column_type: ColumnType) -> Self {
        Self {
            name,
            column_type,
            required: false,
            unique: false,
        }
    }

    /// Mark the column NOT NULL
    pub const fn required(self) -> Self {
        Self {
            name: self.name,
            column_type: self.column_type,
            required: true,
            unique: self.unique,
        }
    }

    /// Mark the column UNIQUE
    pub const fn unique(self) -> Self {
        Self {
            name: self.name,
            column_type: self.column_type,
            required: self.required,
            unique: true,
        }
    }
}

/// Foreign key definition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ForeignKeyDef {
    pub name: &'static str,
    pub columns: &'static [&'static str],
    pub references: &'static str,
    pub referenced_columns: &'static [&'static str],
    /// Child rows are existence-dependent on the parent
    pub on_delete_cascade: bool,
}

/// Table definition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableDef {
    pub name: &'static str,
    pub columns: &'static [ColumnDef],
    pub primary_key: &'static [&'static str],
    pub foreign_keys: &'static [ForeignKeyDef],
}

/// Quote an identifier, preserving case
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn quote_list(names: &[&str]) -> String {
    names
        .iter()
        .map(|n| quote_ident(n))
        .collect::<Vec<_>>()
        .join(", ")
}

impl TableDef {
    /// Position of a column in row order
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    /// Row positions of the primary key columns
    pub fn primary_key_indices(&self) -> Vec<usize> {
        self.primary_key
            .iter()
            .filter_map(|name| self.column_index(name))
            .collect()
    }

    /// Names of the tables this table references
    pub fn dependencies(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.foreign_keys.iter().map(|fk| fk.references)
    }

    /// Render the CREATE TABLE statement
    pub fn create_sql(&self, dialect: SqlDialect) -> String {
        let mut lines: Vec<String> = self
            .columns
            .iter()
            .map(|c| {
                let mut line = format!("    {} {}", quote_ident(c.name), c.column_type.sql(dialect));
                if c.required {
                    line.push_str(" NOT NULL");
                }
                if c.unique {
                    line.push_str(" UNIQUE");
                }
                line
            })
            .collect();

        lines.push(format!("    PRIMARY KEY ({})", quote_list(self.primary_key)));

        for fk in self.foreign_keys {
            let mut line = format!(
                "    CONSTRAINT {} FOREIGN KEY ({}) REFERENCES {} ({})",
                quote_ident(fk.name),
                quote_list(fk.columns),
                quote_ident(fk.references),
                quote_list(fk.referenced_columns)
            );
            if fk.on_delete_cascade && dialect == SqlDialect::Postgres {
                line.push_str(" ON DELETE CASCADE");
            }
            lines.push(line);
        }

        format!(
            "CREATE TABLE {} (\n{}\n)",
            quote_ident(self.name),
            lines.join(",\n")
        )
    }

    /// Render the DROP TABLE statement
    pub fn drop_sql(&self, dialect: SqlDialect) -> String {
        match dialect {
            SqlDialect::DuckDB => format!("DROP TABLE {}", quote_ident(self.name)),
            SqlDialect::Postgres => format!("DROP TABLE {} CASCADE", quote_ident(self.name)),
        }
    }

    /// Render the parameterized INSERT statement for one row
    pub fn insert_sql(&self, dialect: SqlDialect, mode: WriteMode) -> String {
        let placeholders: Vec<String> = self
            .columns
            .iter()
            .enumerate()
            .map(|(i, c)| match (dialect, c.column_type) {
                (SqlDialect::DuckDB, _) => "?".to_string(),
                (SqlDialect::Postgres, ColumnType::Decimal { precision, scale }) => {
                    format!("${}::TEXT::NUMERIC({}, {})", i + 1, precision, scale)
                }
                (SqlDialect::Postgres, _) => format!("${}", i + 1),
            })
            .collect();

        let column_names: Vec<&str> = self.columns.iter().map(|c| c.name).collect();
        let mut sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            quote_ident(self.name),
            quote_list(&column_names),
            placeholders.join(", ")
        );
        if mode == WriteMode::InsertIfAbsent {
            sql.push_str(" ON CONFLICT DO NOTHING");
        }
        sql
    }

    /// Render a row count query
    pub fn count_sql(&self) -> String {
        format!("SELECT COUNT(*) FROM {}", quote_ident(self.name))
    }
}

/// Table definitions, one constant per relation
pub mod tables {
    use super::{ColumnDef, ColumnType, ForeignKeyDef, TableDef};

    const fn varchar(name: &'static str, len: u16) -> ColumnDef {
        ColumnDef::new(name, ColumnType::Varchar(len))
    }

    const fn integer(name: &'static str) -> ColumnDef {
        ColumnDef::new(name, ColumnType::Integer)
    }

    const fn date(name: &'static str) -> ColumnDef {
        ColumnDef::new(name, ColumnType::Date)
    }

    const fn clob(name: &'static str) -> ColumnDef {
        ColumnDef::new(name, ColumnType::Clob)
    }

    const fn fk(
        name: &'static str,
        columns: &'static [&'static str],
        references: &'static str,
        referenced_columns: &'static [&'static str],
        on_delete_cascade: bool,
    ) -> ForeignKeyDef {
        ForeignKeyDef {
            name,
            columns,
            references,
            referenced_columns,
            on_delete_cascade,
        }
    }

    // Lookup tables

    pub const DOMAINE_CARTE_CREDIT: TableDef = TableDef {
        name: "DomaineCarteCredit",
        columns: &[varchar("carteCreditType", 10).required()],
        primary_key: &["carteCreditType"],
        foreign_keys: &[],
    };

    pub const DOMAINE_FORFAIT: TableDef = TableDef {
        name: "DomaineForfait",
        columns: &[varchar("type", 10).required()],
        primary_key: &["type"],
        foreign_keys: &[],
    };

    pub const DOMAINE_COPIE: TableDef = TableDef {
        name: "DomaineCopie",
        columns: &[varchar("etat", 10).required()],
        primary_key: &["etat"],
        foreign_keys: &[],
    };

    pub const PAYS_PRODUCTION: TableDef = TableDef {
        name: "PaysProduction",
        columns: &[varchar("nomPays", 60).required()],
        primary_key: &["nomPays"],
        foreign_keys: &[],
    };

    pub const GENRE: TableDef = TableDef {
        name: "Genre",
        columns: &[varchar("nomGenre", 20).required()],
        primary_key: &["nomGenre"],
        foreign_keys: &[],
    };

    // Core entities

    pub const PERSONNE: TableDef = TableDef {
        name: "Personne",
        columns: &[
            varchar("idPersonne", 10).required(),
            varchar("nom", 255),
            date("dateNaissance"),
            varchar("lieuNaissance", 255),
            varchar("photo", 255),
            clob("biographie"),
        ],
        primary_key: &["idPersonne"],
        foreign_keys: &[],
    };

    pub const SCENARISTE: TableDef = TableDef {
        name: "Scenariste",
        columns: &[
            varchar("idScenariste", 36).required(),
            varchar("nom", 255).required().unique(),
        ],
        primary_key: &["idScenariste"],
        foreign_keys: &[],
    };

    pub const UTILISATEUR: TableDef = TableDef {
        name: "Utilisateur",
        columns: &[
            varchar("idUser", 10).required(),
            varchar("prenom", 255),
            varchar("nom", 255),
            varchar("courriel", 255).unique(),
            varchar("motDePasse", 50),
            varchar("telephone", 20),
            varchar("adresse", 255),
            varchar("ville", 255),
            varchar("province", 20),
            varchar("codePostal", 10),
            date("dateNaissance"),
        ],
        primary_key: &["idUser"],
        foreign_keys: &[],
    };

    pub const FILM: TableDef = TableDef {
        name: "Film",
        columns: &[
            varchar("idFilm", 10).required(),
            varchar("titre", 255),
            integer("anneeSortie"),
            varchar("langue", 50),
            integer("dureeFilm"),
            clob("resume"),
            varchar("affiche", 255),
            varchar("idRealisateur", 10),
        ],
        primary_key: &["idFilm"],
        foreign_keys: &[fk(
            "fk_film_realisateur",
            &["idRealisateur"],
            "Personne",
            &["idPersonne"],
            false,
        )],
    };

    // Subscription and payment

    pub const FORFAIT: TableDef = TableDef {
        name: "Forfait",
        columns: &[
            varchar("codeForfait", 10).required(),
            ColumnDef::new(
                "coûtMensuel",
                ColumnType::Decimal {
                    precision: 10,
                    scale: 2,
                },
            )
            .required(),
            integer("locationsMax").required(),
            integer("dureeMaxJours").required(),
            varchar("type", 10).required(),
        ],
        primary_key: &["codeForfait"],
        foreign_keys: &[fk(
            "fk_forfait_domaine",
            &["type"],
            "DomaineForfait",
            &["type"],
            false,
        )],
    };

    pub const EMPLOYE: TableDef = TableDef {
        name: "Employe",
        columns: &[
            varchar("idUser", 10).required(),
            integer("matricule").required().unique(),
        ],
        primary_key: &["idUser"],
        foreign_keys: &[fk(
            "fk_employe_utilisateur",
            &["idUser"],
            "Utilisateur",
            &["idUser"],
            true,
        )],
    };

    pub const CLIENT: TableDef = TableDef {
        name: "Client",
        columns: &[
            varchar("idUser", 10).required(),
            varchar("carteCreditNumero", 19).unique(),
            integer("carteCreditExpMois"),
            integer("carteCreditExpAnnee"),
            integer("carteCreditCVV").required(),
            varchar("carteCreditType", 10),
            varchar("codeForfait", 10),
        ],
        primary_key: &["idUser"],
        foreign_keys: &[
            fk(
                "fk_client_utilisateur",
                &["idUser"],
                "Utilisateur",
                &["idUser"],
                true,
            ),
            fk(
                "fk_client_domaine_carte",
                &["carteCreditType"],
                "DomaineCarteCredit",
                &["carteCreditType"],
                false,
            ),
            fk(
                "fk_client_forfait",
                &["codeForfait"],
                "Forfait",
                &["codeForfait"],
                false,
            ),
        ],
    };

    // Media instances

    pub const COPIE: TableDef = TableDef {
        name: "Copie",
        columns: &[
            varchar("code", 40).required(),
            varchar("idFilm", 10).required(),
            varchar("etat", 10).required(),
        ],
        primary_key: &["code"],
        foreign_keys: &[
            fk("fk_copie_film", &["idFilm"], "Film", &["idFilm"], true),
            fk(
                "fk_copie_domaine_etat",
                &["etat"],
                "DomaineCopie",
                &["etat"],
                false,
            ),
        ],
    };

    pub const BANDE_ANNONCE: TableDef = TableDef {
        name: "BandeAnnonce",
        columns: &[
            varchar("idBandeAnnonce", 36).required(),
            varchar("url", 255).required(),
            varchar("idFilm", 10).required(),
        ],
        primary_key: &["idBandeAnnonce"],
        foreign_keys: &[fk(
            "fk_bandeannonce_film",
            &["idFilm"],
            "Film",
            &["idFilm"],
            true,
        )],
    };

    // Junction tables

    pub const FILM_PAYS: TableDef = TableDef {
        name: "FilmPays",
        columns: &[
            varchar("idFilm", 10).required(),
            varchar("nomPays", 60).required(),
        ],
        primary_key: &["idFilm", "nomPays"],
        foreign_keys: &[
            fk("fk_filmpays_film", &["idFilm"], "Film", &["idFilm"], true),
            fk(
                "fk_filmpays_pays",
                &["nomPays"],
                "PaysProduction",
                &["nomPays"],
                true,
            ),
        ],
    };

    pub const FILM_GENRE: TableDef = TableDef {
        name: "FilmGenre",
        columns: &[
            varchar("idFilm", 10).required(),
            varchar("nomGenre", 20).required(),
        ],
        primary_key: &["idFilm", "nomGenre"],
        foreign_keys: &[
            fk("fk_filmgenre_film", &["idFilm"], "Film", &["idFilm"], true),
            fk(
                "fk_filmgenre_genre",
                &["nomGenre"],
                "Genre",
                &["nomGenre"],
                true,
            ),
        ],
    };

    pub const FILM_SCENARISTE: TableDef = TableDef {
        name: "FilmScenariste",
        columns: &[
            varchar("idFilm", 10).required(),
            varchar("idScenariste", 36).required(),
        ],
        primary_key: &["idFilm", "idScenariste"],
        foreign_keys: &[
            fk(
                "fk_filmscenariste_film",
                &["idFilm"],
                "Film",
                &["idFilm"],
                true,
            ),
            fk(
                "fk_filmscenariste_scenariste",
                &["idScenariste"],
                "Scenariste",
                &["idScenariste"],
                true,
            ),
        ],
    };

    pub const ROLE: TableDef = TableDef {
        name: "Role",
        columns: &[
            varchar("idRole", 36).required(),
            varchar("personnage", 255),
            varchar("idFilm", 10).required(),
            varchar("idActeur", 10).required(),
        ],
        primary_key: &["idRole"],
        foreign_keys: &[
            fk("fk_role_film", &["idFilm"], "Film", &["idFilm"], true),
            fk(
                "fk_role_acteur",
                &["idActeur"],
                "Personne",
                &["idPersonne"],
                true,
            ),
        ],
    };

    // Rentals

    pub const LOCATION: TableDef = TableDef {
        name: "Location",
        columns: &[
            varchar("idLocation", 10).required(),
            date("dateDebut").required(),
            date("dateFin").required(),
            date("dateRetourEffectif"),
            varchar("idClient", 10).required(),
            varchar("idCopie", 40).required(),
        ],
        primary_key: &["idLocation"],
        foreign_keys: &[
            fk(
                "fk_location_client",
                &["idClient"],
                "Client",
                &["idUser"],
                false,
            ),
            fk(
                "fk_location_copie",
                &["idCopie"],
                "Copie",
                &["code"],
                false,
            ),
        ],
    };
}

/// The full catalog, in forward dependency order
const CATALOG: &[TableDef] = &[
    tables::DOMAINE_CARTE_CREDIT,
    tables::DOMAINE_FORFAIT,
    tables::DOMAINE_COPIE,
    tables::PAYS_PRODUCTION,
    tables::GENRE,
    tables::PERSONNE,
    tables::SCENARISTE,
    tables::UTILISATEUR,
    tables::FILM,
    tables::FORFAIT,
    tables::EMPLOYE,
    tables::CLIENT,
    tables::COPIE,
    tables::BANDE_ANNONCE,
    tables::FILM_PAYS,
    tables::FILM_GENRE,
    tables::FILM_SCENARISTE,
    tables::ROLE,
    tables::LOCATION,
];

/// Database schema helper
pub struct DatabaseSchema;

impl DatabaseSchema {
    /// All tables in creation order
    pub fn tables() -> &'static [TableDef] {
        CATALOG
    }

    /// All tables in drop order (reverse of creation)
    pub fn tables_for_drop() -> impl Iterator<Item = &'static TableDef> {
        CATALOG.iter().rev()
    }

    /// Position of a table in creation order
    pub fn position(name: &str) -> Option<usize> {
        CATALOG.iter().position(|t| t.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_has_all_tables() {
        assert_eq!(DatabaseSchema::tables().len(), 19);
        assert_eq!(DatabaseSchema::tables()[0].name, "DomaineCarteCredit");
        assert_eq!(DatabaseSchema::tables()[18].name, "Location");
    }

    #[test]
    fn test_drop_order_is_reverse() {
        let drop: Vec<&str> = DatabaseSchema::tables_for_drop().map(|t| t.name).collect();
        assert_eq!(drop.first(), Some(&"Location"));
        assert_eq!(drop.last(), Some(&"DomaineCarteCredit"));
    }

    #[test]
    fn test_lookup_is_case_sensitive() {
        assert!(DatabaseSchema::position("Film").is_some());
        assert!(DatabaseSchema::position("film").is_none());
        assert!(DatabaseSchema::position("Personne") < DatabaseSchema::position("Film"));
    }

    #[test]
    fn test_create_sql_quotes_identifiers() {
        let sql = tables::FILM_PAYS.create_sql(SqlDialect::Postgres);
        assert!(sql.starts_with("CREATE TABLE \"FilmPays\""));
        assert!(sql.contains("PRIMARY KEY (\"idFilm\", \"nomPays\")"));
        assert!(sql.contains("REFERENCES \"Film\" (\"idFilm\") ON DELETE CASCADE"));
    }

    #[test]
    fn test_duckdb_omits_cascade() {
        let sql = tables::FILM_PAYS.create_sql(SqlDialect::DuckDB);
        assert!(sql.contains("REFERENCES \"Film\" (\"idFilm\")"));
        assert!(!sql.contains("CASCADE"));
        assert_eq!(tables::FILM.drop_sql(SqlDialect::DuckDB), "DROP TABLE \"Film\"");
        assert_eq!(
            tables::FILM.drop_sql(SqlDialect::Postgres),
            "DROP TABLE \"Film\" CASCADE"
        );
    }

    #[test]
    fn test_insert_sql() {
        let sql = tables::GENRE.insert_sql(SqlDialect::Postgres, WriteMode::InsertIfAbsent);
        assert_eq!(
            sql,
            "INSERT INTO \"Genre\" (\"nomGenre\") VALUES ($1) ON CONFLICT DO NOTHING"
        );

        let sql = tables::FORFAIT.insert_sql(SqlDialect::Postgres, WriteMode::Insert);
        assert!(sql.contains("$2::TEXT::NUMERIC(10, 2)"));

        let sql = tables::ROLE.insert_sql(SqlDialect::DuckDB, WriteMode::Insert);
        assert!(sql.ends_with("VALUES (?, ?, ?, ?)"));
    }

    #[test]
    fn test_required_and_unique_columns() {
        let sql = tables::UTILISATEUR.create_sql(SqlDialect::Postgres);
        assert!(sql.contains("\"idUser\" VARCHAR(10) NOT NULL"));
        assert!(sql.contains("\"courriel\" VARCHAR(255) UNIQUE"));
        let sql = tables::FORFAIT.create_sql(SqlDialect::DuckDB);
        assert!(sql.contains("\"coûtMensuel\" DECIMAL(10, 2) NOT NULL"));
    }

    #[test]
    fn test_primary_key_indices() {
        assert_eq!(tables::FILM_GENRE.primary_key_indices(), vec![0, 1]);
        assert_eq!(tables::FILM.primary_key_indices(), vec![0]);
        assert_eq!(tables::CLIENT.column_index("codeForfait"), Some(6));
    }
}
