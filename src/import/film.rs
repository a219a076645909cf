//! `<film>` records
//!
//! A film carries nested multi-valued children. Each `<role>` is rebuilt
//! from its own closed element, so an actor id and character always come
//! from the same role.

use super::{Element, FieldParser, XmlRecord};
use crate::error::LoadResult;
use crate::models::{Director, Film, Role};

fn role(parser: &FieldParser, element: &Element) -> LoadResult<Option<Role>> {
    let actor = element.find("acteur");
    let actor_id = match actor {
        Some(actor) => parser.id_attribute(actor)?,
        None => None,
    };

    match actor_id {
        Some(actor_id) if actor_id >= 0 => Ok(Some(Role {
            actor_id,
            actor_name: actor.and_then(Element::text),
            character: element.field("personnage"),
        })),
        _ => {
            tracing::warn!(
                "Film {}: dropping role without an actor id",
                parser.id
            );
            Ok(None)
        }
    }
}

impl XmlRecord for Film {
    const TAG: &'static str = "film";

    fn from_element(id: i64, element: &Element) -> LoadResult<Self> {
        let parser = FieldParser {
            record: Self::TAG,
            id,
        };

        let director = match element.find("realisateur") {
            Some(realisateur) => parser
                .id_attribute(realisateur)?
                .filter(|id| *id >= 0)
                .map(|director_id| Director {
                    id: director_id,
                    name: realisateur.text(),
                }),
            None => None,
        };

        let mut roles = Vec::new();
        for element in element.find_all("role") {
            if let Some(role) = role(&parser, element)? {
                roles.push(role);
            }
        }

        Ok(Film {
            id,
            title: element.field("titre"),
            year: parser.int(element, "annee")?,
            countries: element.fields("pays"),
            language: element.field("langue"),
            duration: parser.int(element, "duree")?,
            synopsis: element.field("resume"),
            genres: element.fields("genre"),
            director,
            writers: element.fields("scenariste"),
            roles,
            poster: element.field("poster"),
            trailers: element.fields("annonce"),
        })
    }
}
