//! `<personne>` records

use super::{Element, FieldParser, XmlRecord};
use crate::error::LoadResult;
use crate::models::Person;

impl XmlRecord for Person {
    const TAG: &'static str = "personne";

    fn from_element(id: i64, element: &Element) -> LoadResult<Self> {
        let parser = FieldParser {
            record: Self::TAG,
            id,
        };

        Ok(Person {
            id,
            name: element.field("nom"),
            birth_date: parser.date(element, "anniversaire")?,
            birthplace: element.field("lieu"),
            photo: element.field("photo"),
            biography: element.field("bio"),
        })
    }
}
