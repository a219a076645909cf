//! Record to row mapping
//!
//! Each top-level record becomes a set of rows across several relations.
//! Reference rows are emitted only on the first sighting of their natural
//! key in the run and are always written with a conditional insert.
//! Ordering between relations is not decided here: the batch loader
//! flushes by catalog position, which already places parents first.

use rand::Rng;
use rand::rngs::StdRng;
use std::collections::{BTreeMap, HashSet};

use super::registry::{ReferenceKind, ReferenceRegistry};
use crate::database::schema::{TableDef, tables};
use crate::database::{Row, SqlValue, WriteMode};
use crate::models::{Client, Film, Person};

/// State of copies generated for every film
pub const AVAILABLE_COPY_STATE: &str = "Disponible";

/// Monthly cost of plans created from client records
const PLAN_DEFAULT_COST: &str = "0.00";

/// Upper bound of the generated card verification value
const MAX_CVV: i64 = 9999;

/// One row bound for one relation
#[derive(Debug, Clone, PartialEq)]
pub struct StagedRow {
    pub table: &'static TableDef,
    pub mode: WriteMode,
    pub row: Row,
}

impl StagedRow {
    /// Plain insert
    pub fn insert(table: &'static TableDef, row: Row) -> Self {
        Self {
            table,
            mode: WriteMode::Insert,
            row,
        }
    }

    /// Insert unless the primary key is already present
    pub fn if_absent(table: &'static TableDef, row: Row) -> Self {
        Self {
            table,
            mode: WriteMode::InsertIfAbsent,
            row,
        }
    }
}

/// Run-scoped state needed while mapping records
pub struct MappingContext<'a> {
    pub registry: &'a mut ReferenceRegistry,
    pub rng: &'a mut StdRng,
    /// Copies per film are drawn from `1..=max_copies`
    pub max_copies: u32,
    /// Number of copies drawn for each film, by film id
    pub copies_drawn: &'a mut BTreeMap<i64, u32>,
}

/// A record that can be turned into rows
pub trait ToRows {
    fn to_rows(&self, ctx: &mut MappingContext<'_>) -> Vec<StagedRow>;
}

/// Distinct values in first-seen order
fn distinct(values: &[String]) -> Vec<&str> {
    let mut seen = HashSet::new();
    values
        .iter()
        .map(String::as_str)
        .filter(|v| seen.insert(*v))
        .collect()
}

/// Code of the `n`th copy of a film
pub fn copy_code(film_id: i64, n: u32) -> String {
    format!("CP_{}_{:03}", film_id, n)
}

impl ToRows for Person {
    fn to_rows(&self, _ctx: &mut MappingContext<'_>) -> Vec<StagedRow> {
        vec![StagedRow::insert(
            &tables::PERSONNE,
            vec![
                self.id.to_string().into(),
                self.name.clone().into(),
                self.birth_date.into(),
                self.birthplace.clone().into(),
                self.photo.clone().into(),
                self.biography.clone().into(),
            ],
        )]
    }
}

impl ToRows for Film {
    fn to_rows(&self, ctx: &mut MappingContext<'_>) -> Vec<StagedRow> {
        let film_id = SqlValue::from(self.id.to_string());
        let mut rows = Vec::new();

        if ctx
            .registry
            .first_sighting(ReferenceKind::CopyState, AVAILABLE_COPY_STATE)
        {
            rows.push(StagedRow::if_absent(
                &tables::DOMAINE_COPIE,
                vec![AVAILABLE_COPY_STATE.into()],
            ));
        }

        rows.push(StagedRow::insert(
            &tables::FILM,
            vec![
                film_id.clone(),
                self.title.clone().into(),
                self.year.into(),
                self.language.clone().into(),
                self.duration.into(),
                self.synopsis.clone().into(),
                self.poster.clone().into(),
                self.director.as_ref().map(|d| d.id.to_string()).into(),
            ],
        ));

        for country in distinct(&self.countries) {
            if ctx.registry.first_sighting(ReferenceKind::Country, country) {
                rows.push(StagedRow::if_absent(
                    &tables::PAYS_PRODUCTION,
                    vec![country.into()],
                ));
            }
            rows.push(StagedRow::insert(
                &tables::FILM_PAYS,
                vec![film_id.clone(), country.into()],
            ));
        }

        for genre in distinct(&self.genres) {
            if ctx.registry.first_sighting(ReferenceKind::Genre, genre) {
                rows.push(StagedRow::if_absent(&tables::GENRE, vec![genre.into()]));
            }
            rows.push(StagedRow::insert(
                &tables::FILM_GENRE,
                vec![film_id.clone(), genre.into()],
            ));
        }

        for writer in distinct(&self.writers) {
            let (writer_id, new) = ctx.registry.writer_id(writer);
            if new {
                rows.push(StagedRow::insert(
                    &tables::SCENARISTE,
                    vec![writer_id.clone().into(), writer.into()],
                ));
            }
            rows.push(StagedRow::insert(
                &tables::FILM_SCENARISTE,
                vec![film_id.clone(), writer_id.into()],
            ));
        }

        for role in &self.roles {
            rows.push(StagedRow::insert(
                &tables::ROLE,
                vec![
                    ctx.registry.next_surrogate().into(),
                    role.character.clone().into(),
                    film_id.clone(),
                    role.actor_id.to_string().into(),
                ],
            ));
        }

        for url in &self.trailers {
            rows.push(StagedRow::insert(
                &tables::BANDE_ANNONCE,
                vec![
                    ctx.registry.next_surrogate().into(),
                    url.as_str().into(),
                    film_id.clone(),
                ],
            ));
        }

        let copies = ctx.rng.gen_range(1..=ctx.max_copies.max(1));
        tracing::debug!("Film {}: generating {} copies", self.id, copies);
        ctx.copies_drawn.insert(self.id, copies);
        for n in 1..=copies {
            rows.push(StagedRow::insert(
                &tables::COPIE,
                vec![
                    copy_code(self.id, n).into(),
                    film_id.clone(),
                    AVAILABLE_COPY_STATE.into(),
                ],
            ));
        }

        rows
    }
}

impl ToRows for Client {
    fn to_rows(&self, ctx: &mut MappingContext<'_>) -> Vec<StagedRow> {
        let user_id = SqlValue::from(self.id.to_string());
        let mut rows = vec![StagedRow::insert(
            &tables::UTILISATEUR,
            vec![
                user_id.clone(),
                self.first_name.clone().into(),
                self.last_name.clone().into(),
                self.email.clone().into(),
                self.password.clone().into(),
                self.phone.clone().into(),
                self.address.clone().into(),
                self.city.clone().into(),
                self.province.clone().into(),
                self.postal_code.clone().into(),
                self.birth_date.into(),
            ],
        )];

        if let Some(card_type) = &self.card.card_type
            && ctx.registry.first_sighting(ReferenceKind::CardType, card_type)
        {
            rows.push(StagedRow::if_absent(
                &tables::DOMAINE_CARTE_CREDIT,
                vec![card_type.as_str().into()],
            ));
        }

        if let Some(plan) = &self.plan
            && ctx.registry.first_sighting(ReferenceKind::PlanCode, plan)
        {
            rows.push(StagedRow::if_absent(
                &tables::DOMAINE_FORFAIT,
                vec![plan.as_str().into()],
            ));
            rows.push(StagedRow::if_absent(
                &tables::FORFAIT,
                vec![
                    plan.as_str().into(),
                    SqlValue::Decimal(PLAN_DEFAULT_COST.to_string()),
                    SqlValue::Int(0),
                    SqlValue::Int(0),
                    plan.as_str().into(),
                ],
            ));
        }

        rows.push(StagedRow::insert(
            &tables::CLIENT,
            vec![
                user_id,
                self.card.number.clone().into(),
                self.card.exp_month.into(),
                self.card.exp_year.into(),
                SqlValue::Int(ctx.rng.gen_range(0..=MAX_CVV)),
                self.card.card_type.clone().into(),
                self.plan.clone().into(),
            ],
        ));

        rows
    }
}
