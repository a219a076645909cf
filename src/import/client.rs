//! `<client>` records

use super::{Element, FieldParser, XmlRecord};
use crate::error::LoadResult;
use crate::models::{Client, PaymentCard};

impl XmlRecord for Client {
    const TAG: &'static str = "client";

    fn from_element(id: i64, element: &Element) -> LoadResult<Self> {
        let parser = FieldParser {
            record: Self::TAG,
            id,
        };

        let card = PaymentCard {
            card_type: element.field("carte"),
            number: element.field("no"),
            exp_month: parser.int(element, "exp-mois")?,
            exp_year: parser.int(element, "exp-annee")?,
        };

        Ok(Client {
            id,
            last_name: element.field("nom-famille"),
            first_name: element.field("prenom"),
            email: element.field("courriel"),
            phone: element.field("tel"),
            birth_date: parser.date(element, "anniversaire")?,
            address: element.field("adresse"),
            city: element.field("ville"),
            province: element.field("province"),
            postal_code: element.field("code-postal"),
            password: element.field("mot-de-passe"),
            card,
            plan: element.field("forfait"),
        })
    }
}
