//! End-to-end mapping runs over in-memory and synthetic sources

mod support;

use std::sync::Arc;

use fluree_db_rml::vocab::grel;
use fluree_db_rml::{
    CompiledRmlMapping, ErrorKind, FunctionParameters, FunctionRegistry, InMemoryResolver,
    JoinCondition, LogicalSource, MappingPipeline, PredicateObjectMap, RawValue, RdfTerm,
    RefObjectMap, RmlConfig, RmlError, RmlResult, SubjectMap, TermMap, TermType, TriplesMap, RML,
};
use futures::StreamExt;
use serde_json::json;

use support::span_capture::init_test_tracing;
use support::{ntriples, TrackingResolver, ENDLESS, FAILING};

fn routes_and_airlines() -> (CompiledRmlMapping, InMemoryResolver) {
    let route = TriplesMap::new("<#Route>", LogicalSource::new("routes.json"))
        .with_subject(SubjectMap::template("http://ex.org/route/{id}"))
        .with_predicate_object(PredicateObjectMap::constant(
            "http://ex.org/airline",
            RefObjectMap::with_conditions(
                "<#Airline>",
                vec![JoinCondition::new("airline_id", "id")],
            ),
        ));
    let airline = TriplesMap::new("<#Airline>", LogicalSource::new("airlines.json"))
        .with_subject(SubjectMap::template("http://ex.org/airline/{code}"));

    let resolver = InMemoryResolver::new()
        .with_source(
            "routes.json",
            vec![
                json!({"id": "r1", "airline_id": "A1"}),
                json!({"id": "r2", "airline_id": "A2"}),
                json!({"id": "r3", "airline_id": "ZZ"}),
            ],
        )
        .with_source(
            "airlines.json",
            vec![
                json!({"id": "A1", "code": "aa"}),
                json!({"id": "A1", "code": "ab"}),
                json!({"id": "A2", "code": "b"}),
            ],
        );

    (CompiledRmlMapping::new(vec![route, airline]), resolver)
}

fn pipeline(
    mapping: &CompiledRmlMapping,
    resolver: TrackingResolver,
    config: RmlConfig,
) -> MappingPipeline {
    MappingPipeline::new(
        mapping,
        &FunctionRegistry::with_builtins(),
        Arc::new(resolver),
        config,
    )
    .unwrap()
}

#[tokio::test]
async fn join_emits_one_triple_per_matching_parent() {
    let (mapping, sources) = routes_and_airlines();
    let resolver = TrackingResolver::new(sources.clone());

    let quads = pipeline(&mapping, resolver.clone(), RmlConfig::default())
        .run()
        .collect()
        .await
        .unwrap();

    assert_eq!(
        ntriples(&quads),
        vec![
            "<http://ex.org/route/r1> <http://ex.org/airline> <http://ex.org/airline/aa> .",
            "<http://ex.org/route/r1> <http://ex.org/airline> <http://ex.org/airline/ab> .",
            "<http://ex.org/route/r2> <http://ex.org/airline> <http://ex.org/airline/b> .",
        ]
    );
    assert_eq!(resolver.opened(), 2);
    assert_eq!(resolver.closed(), 2);
    assert_eq!(sources.active_sources(), 0);
}

#[tokio::test]
async fn join_with_one_source_at_a_time() {
    let (mapping, sources) = routes_and_airlines();
    let config = RmlConfig::default()
        .with_max_concurrent_sources(1)
        .with_batch_size(1)
        .with_channel_capacity(1);

    let quads = pipeline(&mapping, TrackingResolver::new(sources), config)
        .run()
        .collect()
        .await
        .unwrap();
    assert_eq!(quads.len(), 3);
}

#[tokio::test]
async fn composite_join_key_requires_every_condition() {
    let child = TriplesMap::new("<#Child>", LogicalSource::new("child.json"))
        .with_subject(SubjectMap::template("http://ex.org/child/{id}"))
        .with_predicate_object(PredicateObjectMap::constant(
            "http://ex.org/parent",
            RefObjectMap::with_conditions(
                "<#Parent>",
                vec![JoinCondition::new("a", "x"), JoinCondition::new("b", "y")],
            ),
        ));
    let parent = TriplesMap::new("<#Parent>", LogicalSource::new("parent.json"))
        .with_subject(SubjectMap::template("http://ex.org/parent/{id}"));

    let sources = InMemoryResolver::new()
        .with_source(
            "child.json",
            vec![
                json!({"id": "c1", "a": "1", "b": "2"}),
                json!({"id": "c2", "a": "1", "b": "3"}),
            ],
        )
        .with_source(
            "parent.json",
            vec![
                json!({"id": "p1", "x": "1", "y": "2"}),
                json!({"id": "p2", "x": "1", "y": "4"}),
            ],
        );

    let mapping = CompiledRmlMapping::new(vec![child, parent]);
    let quads = pipeline(&mapping, TrackingResolver::new(sources), RmlConfig::default())
        .run()
        .collect()
        .await
        .unwrap();

    assert_eq!(
        ntriples(&quads),
        vec!["<http://ex.org/child/c1> <http://ex.org/parent> <http://ex.org/parent/p1> ."]
    );
}

#[test]
fn construction_errors_reported_before_any_source_opens() {
    let bad = TriplesMap::new("<#Bad>", LogicalSource::new("people.json"))
        .with_subject(SubjectMap::template("http://ex.org/{id"))
        .with_predicate_object(PredicateObjectMap::constant(
            "http://ex.org/p",
            TermMap::function_value("<#NoSuchFunctionMap>"),
        ))
        .with_predicate_object(PredicateObjectMap::new(
            TermMap::reference("p").with_term_type(TermType::Literal),
            TermMap::reference("v"),
        ));
    let resolver = TrackingResolver::new(InMemoryResolver::new());

    let err = MappingPipeline::new(
        &CompiledRmlMapping::new(vec![bad]),
        &FunctionRegistry::new(),
        Arc::new(resolver.clone()),
        RmlConfig::default(),
    )
    .unwrap_err();

    assert!(err.is_construction());
    assert_eq!(err.errors().len(), 3);
    assert!(err
        .errors()
        .iter()
        .all(|e| e.kind() == ErrorKind::Construction || e.kind() == ErrorKind::TemplateParse));
    assert_eq!(resolver.opened(), 0);
}

#[tokio::test]
async fn function_values_and_term_kinds() {
    let upper_name = TriplesMap::new("<#UpperName>", LogicalSource::new("people.json"))
        .with_predicate_object(PredicateObjectMap::constant(
            RML::EXECUTES,
            TermMap::constant_iri(grel::TO_UPPER_CASE),
        ))
        .with_predicate_object(PredicateObjectMap::constant(
            grel::VALUE_PARAMETER,
            TermMap::reference("name"),
        ));
    let greeting = TriplesMap::new("<#Greeting>", LogicalSource::new("people.json"))
        .with_predicate_object(PredicateObjectMap::constant(
            RML::EXECUTES,
            TermMap::constant_iri("http://ex.org/fn/greet"),
        ))
        .with_predicate_object(PredicateObjectMap::constant(
            "http://ex.org/fn/who",
            TermMap::reference("name"),
        ));
    let person = TriplesMap::new("<#Person>", LogicalSource::new("people.json"))
        .with_subject(
            SubjectMap::template("http://ex.org/person/{id}").with_class("http://ex.org/Person"),
        )
        .with_predicate_object(PredicateObjectMap::constant(
            "http://ex.org/shout",
            TermMap::function_value("<#UpperName>"),
        ))
        .with_predicate_object(PredicateObjectMap::constant(
            "http://ex.org/greeting",
            TermMap::function_value("<#Greeting>").with_language("en"),
        ))
        .with_predicate_object(PredicateObjectMap::constant(
            "http://ex.org/address",
            TermMap::template("{city}").with_term_type(TermType::BlankNode),
        ));

    let mut functions = FunctionRegistry::with_builtins();
    functions.register(
        "http://ex.org/fn/greet",
        |params: &FunctionParameters| -> RmlResult<RawValue> {
            let who = params.string("http://ex.org/fn/who").unwrap_or_default();
            Ok(RawValue::from(format!("hello {who}")))
        },
    );

    let sources = InMemoryResolver::new().with_source(
        "people.json",
        vec![json!({"id": "1", "name": "ada", "city": "Gent"})],
    );
    let mapping = CompiledRmlMapping::new(vec![upper_name, greeting, person]);
    let pipeline = MappingPipeline::new(
        &mapping,
        &functions,
        Arc::new(sources),
        RmlConfig::default(),
    )
    .unwrap();
    assert_eq!(pipeline.plan().triples_map_count(), 1);

    let quads = pipeline.run().collect().await.unwrap();
    let objects: Vec<&RdfTerm> = quads.iter().map(|q| &q.object.term).collect();

    assert_eq!(quads.len(), 4);
    assert!(objects.contains(&&RdfTerm::iri("http://ex.org/Person")));
    assert!(objects.contains(&&RdfTerm::string("ADA")));
    assert!(objects.contains(&&RdfTerm::lang_string("hello ada", "en")));
    assert!(objects.iter().any(|o| o.is_blank_node()));
}

#[tokio::test]
async fn source_failure_cancels_every_driver() {
    let failing = TriplesMap::new("<#Failing>", LogicalSource::new(FAILING))
        .with_subject(SubjectMap::template("http://ex.org/f/{id}"))
        .with_predicate_object(PredicateObjectMap::constant(
            "http://ex.org/p",
            TermMap::constant_literal("x"),
        ));
    let endless = TriplesMap::new("<#Endless>", LogicalSource::new(ENDLESS))
        .with_subject(SubjectMap::template("http://ex.org/e/{id}"))
        .with_predicate_object(PredicateObjectMap::constant(
            "http://ex.org/p",
            TermMap::constant_literal("y"),
        ));
    let resolver = TrackingResolver::new(InMemoryResolver::new());
    let config = RmlConfig::default()
        .with_batch_size(4)
        .with_channel_capacity(8);

    let mut run = pipeline(
        &CompiledRmlMapping::new(vec![failing, endless]),
        resolver.clone(),
        config,
    )
    .run();

    let mut failure = None;
    while let Some(item) = run.next().await {
        if let Err(e) = item {
            failure = Some(e);
        }
    }

    let failure = failure.expect("run should fail");
    assert_eq!(failure.kind(), ErrorKind::Source);
    assert_eq!(resolver.opened(), 2);
    assert_eq!(resolver.closed(), 2);
}

#[tokio::test]
async fn cancel_ends_stream_and_closes_sources() {
    let endless = TriplesMap::new("<#Endless>", LogicalSource::new(ENDLESS))
        .with_subject(SubjectMap::template("http://ex.org/e/{id}"))
        .with_predicate_object(PredicateObjectMap::constant(
            "http://ex.org/p",
            TermMap::reference("id"),
        ));
    let resolver = TrackingResolver::new(InMemoryResolver::new());
    let config = RmlConfig::default()
        .with_batch_size(2)
        .with_channel_capacity(4);

    let mut run = pipeline(
        &CompiledRmlMapping::new(vec![endless]),
        resolver.clone(),
        config,
    )
    .run();

    for _ in 0..10 {
        assert!(run.next().await.unwrap().is_ok());
    }
    run.cancel();
    assert!(run.is_cancelled());

    let mut last = None;
    while let Some(item) = run.next().await {
        last = Some(item);
    }
    assert!(matches!(last, Some(Err(RmlError::Cancelled))));
    assert_eq!(resolver.opened(), 1);
    assert_eq!(resolver.closed(), 1);
}

#[tokio::test]
async fn dropping_run_releases_sources() {
    let endless = TriplesMap::new("<#Endless>", LogicalSource::new(ENDLESS))
        .with_subject(SubjectMap::template("http://ex.org/e/{id}"))
        .with_predicate_object(PredicateObjectMap::constant(
            "http://ex.org/p",
            TermMap::reference("id"),
        ));
    let resolver = TrackingResolver::new(InMemoryResolver::new());

    let mut run = pipeline(
        &CompiledRmlMapping::new(vec![endless]),
        resolver.clone(),
        RmlConfig::default().with_channel_capacity(2),
    )
    .run();
    assert!(run.next().await.unwrap().is_ok());
    drop(run);

    for _ in 0..1000 {
        if resolver.closed() == 1 {
            break;
        }
        tokio::task::yield_now().await;
    }
    assert_eq!(resolver.closed(), resolver.opened());
}

#[tokio::test]
async fn missing_logical_source_fails_run() {
    let (mapping, _) = routes_and_airlines();
    let resolver = TrackingResolver::new(InMemoryResolver::new());

    let err = pipeline(&mapping, resolver.clone(), RmlConfig::default())
        .run()
        .collect()
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Source);
    assert_eq!(resolver.opened(), 0);
}

#[tokio::test(flavor = "current_thread")]
async fn run_emits_mapping_spans() {
    let (store, _guard) = init_test_tracing();
    let (mapping, sources) = routes_and_airlines();

    let quads = pipeline(&mapping, TrackingResolver::new(sources), RmlConfig::default())
        .run()
        .collect()
        .await
        .unwrap();
    assert_eq!(quads.len(), 3);

    let run = store.find_span("rml_mapping_run").unwrap();
    assert_eq!(run.level, tracing::Level::INFO);
    assert_eq!(run.fields.get("triples_maps").map(String::as_str), Some("2"));

    let maps = store.find_spans("rml_triples_map");
    assert_eq!(maps.len(), 2);
    assert!(maps
        .iter()
        .all(|s| s.parent_name.as_deref() == Some("rml_mapping_run")));
    assert!(maps
        .iter()
        .any(|s| s.fields.get("triples_map").map(String::as_str) == Some("<#Route>")));

    let join = store.find_span("rml_join_resolve").unwrap();
    assert_eq!(join.parent_name.as_deref(), Some("rml_triples_map"));
    assert_eq!(join.fields.get("parent").map(String::as_str), Some("<#Airline>"));
    assert_eq!(join.fields.get("child").map(String::as_str), Some("<#Route>"));
}
