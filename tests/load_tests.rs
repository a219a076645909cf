//! End-to-end load tests against the memory backend

use std::collections::{HashMap, HashSet};
use std::io::Write;

use tempfile::NamedTempFile;
use video_rental_loader::database::{Row, SqlValue};
use video_rental_loader::{
    FailurePolicy, LoadError, LoadOptions, LoadPlan, MemoryBackend, Orchestrator, Phase,
};

const PEOPLE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<personnes>
  <personne id="1">
    <nom>Joel Coen</nom>
    <anniversaire>1954-11-29</anniversaire>
    <lieu>St. Louis Park, Minnesota, USA</lieu>
    <photo>http://example.org/joel.jpg</photo>
    <bio>American filmmaker.</bio>
  </personne>
  <personne id="2">
    <nom>Frances McDormand</nom>
    <anniversaire>1957-06-23</anniversaire>
  </personne>
  <personne>
    <nom>No Identifier</nom>
  </personne>
  <personne id="3">
    <nom>William H. Macy</nom>
  </personne>
</personnes>"#;

const FILMS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<films>
  <film id="10">
    <titre>Fargo</titre>
    <annee>1996</annee>
    <pays>USA</pays>
    <pays>UK</pays>
    <langue>English</langue>
    <duree>98</duree>
    <resume>A pregnant police chief investigates.</resume>
    <realisateur id="1">Joel Coen</realisateur>
    <scenariste>Joel Coen</scenariste>
    <scenariste>Ethan Coen</scenariste>
    <role><acteur id="2">Frances McDormand</acteur><personnage>Marge Gunderson</personnage></role>
    <role><acteur id="3">William H. Macy</acteur><personnage>Jerry Lundegaard</personnage></role>
    <poster>http://example.org/fargo.jpg</poster>
    <annonce>http://example.org/fargo-1.mp4</annonce>
    <annonce>http://example.org/fargo-2.mp4</annonce>
  </film>
  <film id="11">
    <titre>Blood Simple</titre>
    <annee>1984</annee>
    <pays>USA</pays>
    <genre>Crime</genre>
    <genre>Thriller</genre>
    <realisateur id="1">Joel Coen</realisateur>
    <scenariste>Ethan Coen</scenariste>
  </film>
  <film id="12">
    <titre>Raising Arizona</titre>
    <pays>USA</pays>
    <genre>Crime</genre>
    <genre>Crime</genre>
    <realisateur id="1">Joel Coen</realisateur>
  </film>
</films>"#;

const CLIENTS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<clients>
  <client id="1001">
    <nom-famille>Tremblay</nom-famille>
    <prenom>Marie</prenom>
    <courriel>marie@example.org</courriel>
    <carte>VISA</carte>
    <no>4111111111111111</no>
    <exp-mois>7</exp-mois>
    <exp-annee>2027</exp-annee>
    <forfait>D</forfait>
  </client>
  <client id="1002">
    <nom-famille>Gagnon</nom-famille>
    <prenom>Luc</prenom>
    <courriel>luc@example.org</courriel>
    <carte>VISA</carte>
    <no>4222222222222</no>
    <forfait>D</forfait>
  </client>
  <client id="1003">
    <nom-famille>Roy</nom-famille>
    <carte>MasterCard</carte>
    <forfait>I</forfait>
  </client>
</clients>"#;

fn source_file(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

fn options(seed: u64) -> LoadOptions {
    LoadOptions {
        batch_size: 2,
        max_copies: 5,
        on_phase_failure: FailurePolicy::Abort,
        seed: Some(seed),
    }
}

fn text(value: &SqlValue) -> &str {
    value.as_text().unwrap_or_default()
}

fn column(rows: &[Row], index: usize) -> Vec<String> {
    rows.iter().map(|r| text(&r[index]).to_string()).collect()
}

async fn full_run(backend: &MemoryBackend, seed: u64) -> video_rental_loader::LoadSummary {
    let people = source_file(PEOPLE);
    let films = source_file(FILMS);
    let clients = source_file(CLIENTS);

    let plan = LoadPlan::new()
        .clients(clients.path())
        .films(films.path())
        .people(people.path())
        .with_reset(true);

    Orchestrator::new(backend.clone(), options(seed))
        .unwrap()
        .run_and_shutdown(&plan)
        .await
        .unwrap()
}

#[tokio::test]
async fn test_full_run_loads_every_phase() {
    let backend = MemoryBackend::new();
    let summary = full_run(&backend, 1).await;

    assert!(summary.is_success());
    let phases: Vec<Phase> = summary.reports.iter().map(|r| r.phase).collect();
    assert_eq!(phases, Phase::ALL.to_vec());

    let people = summary.report(Phase::People).unwrap();
    assert_eq!(people.loaded, 3);
    assert_eq!(people.skipped, 1);
    assert_eq!(people.flush_sizes, vec![2, 1]);

    assert_eq!(summary.report(Phase::Films).unwrap().loaded, 3);
    assert_eq!(summary.report(Phase::Clients).unwrap().loaded, 3);
    assert_eq!(backend.rows("Personne").len(), 3);
    assert_eq!(backend.rows("Utilisateur").len(), 3);
    assert!(backend.is_closed());
}

#[tokio::test]
async fn test_reference_data_inserted_once() {
    let backend = MemoryBackend::new();
    full_run(&backend, 2).await;

    let mut countries = column(&backend.rows("PaysProduction"), 0);
    countries.sort();
    assert_eq!(countries, vec!["UK", "USA"]);

    let mut genres = column(&backend.rows("Genre"), 0);
    genres.sort();
    assert_eq!(genres, vec!["Crime", "Thriller"]);

    let mut card_types = column(&backend.rows("DomaineCarteCredit"), 0);
    card_types.sort();
    assert_eq!(card_types, vec!["MasterCard", "VISA"]);

    let mut plans = column(&backend.rows("Forfait"), 0);
    plans.sort();
    assert_eq!(plans, vec!["D", "I"]);

    let writers = column(&backend.rows("Scenariste"), 1);
    assert_eq!(writers.len(), 2);
    assert_eq!(backend.rows("FilmScenariste").len(), 3);
    assert_eq!(backend.rows("DomaineCopie").len(), 1);
}

#[tokio::test]
async fn test_countries_without_genres() {
    let backend = MemoryBackend::new();
    full_run(&backend, 3).await;

    let film_pays = backend.rows("FilmPays");
    let fargo_countries = film_pays.iter().filter(|r| text(&r[0]) == "10").count();
    assert_eq!(fargo_countries, 2);

    let film_genre = backend.rows("FilmGenre");
    assert!(film_genre.iter().all(|r| text(&r[0]) != "10"));
    // Repeated genre on one film is linked once
    assert_eq!(film_genre.iter().filter(|r| text(&r[0]) == "12").count(), 1);
}

#[tokio::test]
async fn test_copies_are_distinct_per_film() {
    let backend = MemoryBackend::new();
    let summary = full_run(&backend, 4).await;

    let copies = backend.rows("Copie");
    let mut per_film: HashMap<String, HashSet<String>> = HashMap::new();
    for copy in &copies {
        let codes = per_film.entry(text(&copy[1]).to_string()).or_default();
        assert!(codes.insert(text(&copy[0]).to_string()));
        assert_eq!(text(&copy[2]), "Disponible");
    }

    let drawn = &summary.report(Phase::Films).unwrap().copies_per_film;
    assert_eq!(drawn.keys().copied().collect::<Vec<_>>(), vec![10, 11, 12]);
    assert_eq!(per_film.len(), 3);
    for (film_id, count) in drawn {
        assert!((1..=5).contains(count));
        assert_eq!(per_film[&film_id.to_string()].len(), *count as usize);
    }
}

#[tokio::test]
async fn test_surrogate_ids_unique() {
    let backend = MemoryBackend::new();
    full_run(&backend, 5).await;

    let mut ids = HashSet::new();
    for (table, index) in [("Scenariste", 0), ("Role", 0), ("BandeAnnonce", 0)] {
        for row in backend.rows(table) {
            assert!(ids.insert(text(&row[index]).to_string()), "{} reused", table);
        }
    }
    assert_eq!(ids.len(), 2 + 2 + 2);
}

#[tokio::test]
async fn test_same_seed_same_rows() {
    let first = MemoryBackend::new();
    let second = MemoryBackend::new();
    full_run(&first, 42).await;
    full_run(&second, 42).await;

    assert_eq!(first.rows("Copie").len(), second.rows("Copie").len());
    assert_eq!(first.rows("Client"), second.rows("Client"));
}

#[tokio::test]
async fn test_people_reload_after_reset_is_identical() {
    let backend = MemoryBackend::new();
    let people = source_file(PEOPLE);
    let plan = LoadPlan::new().people(people.path()).with_reset(true);

    let mut orchestrator = Orchestrator::new(backend.clone(), options(6)).unwrap();
    orchestrator.run(&plan).await.unwrap();
    let mut first = backend.rows("Personne");

    orchestrator.run(&plan).await.unwrap();
    let mut second = backend.rows("Personne");
    orchestrator.shutdown().await.unwrap();

    let key = |row: &Row| text(&row[0]).to_string();
    first.sort_by_key(key);
    second.sort_by_key(key);
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_directors_flushed_before_films() {
    let backend = MemoryBackend::new();
    full_run(&backend, 7).await;

    let log = backend.batch_log();
    let first = |table: &str| log.iter().position(|(t, _)| t == table).unwrap();
    assert!(first("Personne") < first("Film"));
    assert!(first("Film") < first("Role"));
    assert!(first("Utilisateur") < first("Client"));
}

#[tokio::test]
async fn test_second_load_without_reset_violates_keys() {
    let backend = MemoryBackend::new();
    let people = source_file(PEOPLE);

    let mut orchestrator = Orchestrator::new(backend.clone(), options(8)).unwrap();
    orchestrator
        .run(&LoadPlan::new().people(people.path()).with_reset(true))
        .await
        .unwrap();

    let summary = orchestrator
        .run(&LoadPlan::new().people(people.path()))
        .await
        .unwrap();
    orchestrator.shutdown().await.unwrap();

    assert_eq!(summary.failures.len(), 1);
    assert!(matches!(
        summary.failures[0].error,
        LoadError::Constraint { .. }
    ));
    assert_eq!(backend.rows("Personne").len(), 3);
}
