#![allow(clippy::unwrap_used, clippy::expect_used)]
//! End-to-end pipeline tests: URI + query string in, rendered SQL and
//! bindings out.

use sea_query::Value;
use sift::plan::{Comparison, Conjunction, FieldCondition};
use sift::{
    EngineConfig, EntityDef, MemoryCatalog, PageStyle, PaginationConfig, ParamValue, Params,
    PlanOp, QueryEngine, QueryError, QueryPlan, QueryResult, Relation, RouteMap,
};

// -------------------------------------------------------------------------
// Fixtures
// -------------------------------------------------------------------------

fn catalog() -> MemoryCatalog {
    let mut catalog = MemoryCatalog::new();
    catalog.add_entity(
        EntityDef::new("Letter", "Letter", "LetterId")
            .with_relation(Relation::to_many("photos", "LetterPhoto", "LetterId", "LetterId"))
            .with_relation(Relation::to_one("status", "LetterStatus", "StatusId", "StatusId"))
            .with_relation(Relation::to_many(
                "translations",
                "LetterTranslation",
                "LetterId",
                "LetterId",
            )),
    );
    catalog.add_entity(
        EntityDef::new("LetterPhoto", "LetterPhoto", "PhotoId").with_relation(Relation::to_one(
            "original",
            "PhotoOriginal",
            "OriginalId",
            "OriginalId",
        )),
    );
    catalog.add_entity(EntityDef::new("LetterStatus", "LetterStatus", "StatusId"));
    catalog.add_entity(EntityDef::new("PhotoOriginal", "PhotoOriginal", "OriginalId"));
    catalog.add_entity(EntityDef::new("LetterTranslation", "LetterTranslation", "TranslationId"));
    catalog.add_record("Letter", 23);
    catalog.add_record("LetterPhoto", 4);
    catalog
}

fn routes() -> RouteMap {
    RouteMap::new([
        ("letters", "Letter"),
        ("letters.photos", "Letter.photos"),
        ("letters.photos.original", "LetterPhoto.original"),
        ("letterstatuses", "LetterStatus"),
    ])
    .expect("valid route map")
}

fn with_status(plan: &mut QueryPlan, arg: Option<&ParamValue>) -> QueryResult<()> {
    let status = arg.and_then(ParamValue::as_scalar).unwrap_or("1");
    plan.push(PlanOp::Predicate {
        field: "StatusId".to_string(),
        cond: FieldCondition::Compare {
            op: Comparison::Eq,
            value: status.to_string(),
        },
        conjunction: Conjunction::And,
    });
    Ok(())
}

fn engine() -> QueryEngine {
    QueryEngine::new(EngineConfig::default(), routes())
        .with_refinement("withStatus", with_status)
        .expect("valid refinement")
}

fn build(uri: &str, query: &str) -> QueryResult<QueryPlan> {
    let engine = engine();
    let route = engine.parse_route(uri);
    let params = Params::parse_query(query);
    Ok(engine
        .request(&catalog(), &route, params)?
        .build()?
        .into_plan())
}

// -------------------------------------------------------------------------
// End-to-end scenarios
// -------------------------------------------------------------------------

#[test]
fn collection_request_renders_a_plain_select() {
    let plan = build("/api/v1/letters", "").expect("builds");
    let sql = plan.to_query_string(&catalog()).expect("renders");
    assert_eq!(sql, r#"SELECT "Letter".* FROM "Letter""#);
    assert!(plan.bindings(&catalog()).expect("renders").is_empty());
}

#[test]
fn nested_collection_restricts_by_the_parent_key() {
    let plan = build("/api/v1/letters/23/photos", "").expect("builds");
    assert_eq!(plan.entity, "LetterPhoto");

    let sql = plan.to_query_string(&catalog()).expect("renders");
    assert!(sql.contains(r#"FROM "LetterPhoto""#), "{sql}");
    assert!(sql.contains(r#""LetterPhoto"."LetterId" = 23"#), "{sql}");
}

#[test]
fn single_resource_under_a_parent_gets_both_keys() {
    let plan = build("/api/v1/letters/23/photos/4", "").expect("builds");
    let sql = plan.to_query_string(&catalog()).expect("renders");
    assert!(sql.contains(r#""LetterPhoto"."LetterId" = 23"#), "{sql}");
    assert!(sql.contains(r#""LetterPhoto"."PhotoId" = 4"#), "{sql}");
}

#[test]
fn clauses_and_pagination_compose_into_one_statement() {
    let engine = engine();
    let route = engine.parse_route("/api/v1/letters");
    let params =
        Params::parse_query("betweenLetterId[]=4&betweenLetterId[]=8&whereFirstName=Jon&limit=25");
    let plan = engine
        .request(&catalog(), &route, params)
        .expect("resolves")
        .build()
        .expect("builds")
        .paginate(None)
        .expect("paginates")
        .into_plan();

    let sql = plan.to_query_string(&catalog()).expect("renders");
    assert!(sql.contains("BETWEEN 4 AND 8"), "{sql}");
    assert!(sql.contains(r#""FirstName" = 'Jon'"#), "{sql}");
    assert!(sql.contains("LIMIT 25"), "{sql}");
    assert!(sql.contains("OFFSET 0"), "{sql}");

    // LIMIT and OFFSET are bound like any other value.
    let bindings = plan.bindings(&catalog()).expect("renders");
    assert_eq!(
        bindings,
        vec![
            Value::from(4i64),
            Value::from(8i64),
            Value::from("Jon"),
            Value::from(25u64),
            Value::from(0u64),
        ]
    );
}

#[test]
fn like_clause_binds_wrapped_wildcards() {
    let plan = build("/api/v1/letters", "likeFirstName=Jon").expect("builds");
    let bindings = plan.bindings(&catalog()).expect("renders");
    assert_eq!(bindings, vec![Value::from("%Jon%")]);
}

#[test]
fn or_clauses_group_against_preceding_predicates() {
    let plan = build(
        "/api/v1/letters",
        "whereFirstName=Jon&orwhereFirstName=Jane",
    )
    .expect("builds");
    let sql = plan.to_query_string(&catalog()).expect("renders");
    assert!(sql.contains("OR"), "{sql}");
    assert!(sql.contains("'Jon'"), "{sql}");
    assert!(sql.contains("'Jane'"), "{sql}");
}

#[test]
fn dotted_wheres_filter_through_relations() {
    let plan = build("/api/v1/letters", "wherephotos.Caption=sunset").expect("builds");
    let sql = plan.to_query_string(&catalog()).expect("renders");
    assert!(sql.contains("EXISTS"), "{sql}");
    assert!(sql.contains(r#""LetterPhoto"."Caption" = 'sunset'"#), "{sql}");
}

#[test]
fn eager_loads_ride_along_without_touching_the_sql() {
    let plan = build("/api/v1/letters", "with[]=photos&with[]=status&locale=en").expect("builds");
    assert_eq!(plan.eager_loads(), vec!["photos", "status", "translations"]);

    let sql = plan.to_query_string(&catalog()).expect("renders");
    assert_eq!(sql, r#"SELECT "Letter".* FROM "Letter""#);
}

#[test]
fn refinements_participate_in_the_pipeline() {
    let plan = build("/api/v1/letters", "filterWithStatus=3").expect("builds");
    let sql = plan.to_query_string(&catalog()).expect("renders");
    assert!(sql.contains(r#""StatusId" = 3"#), "{sql}");
}

#[test]
fn count_projection_shares_filters_and_skips_pagination() {
    let engine = engine();
    let catalog = catalog();
    let route = engine.parse_route("/api/v1/letters");
    let params = Params::parse_query("likeFirstName=Jon&orderbyLetterId=desc&limit=25");
    let builder = engine
        .request(&catalog, &route, params)
        .expect("resolves")
        .build()
        .expect("builds")
        .paginate(None)
        .expect("paginates");

    let counter = builder.count_plan();
    let count_sql = counter.to_query_string(&catalog).expect("renders");
    assert!(count_sql.contains("COUNT(*)"), "{count_sql}");
    assert!(count_sql.contains("LIKE '%Jon%'"), "{count_sql}");
    assert!(!count_sql.contains("LIMIT"), "{count_sql}");
    assert!(!count_sql.contains("ORDER BY"), "{count_sql}");

    let row_sql = builder.plan().to_query_string(&catalog).expect("renders");
    assert!(row_sql.contains("LIMIT 25"), "{row_sql}");
    assert!(row_sql.contains("ORDER BY"), "{row_sql}");
}

#[test]
fn page_style_configuration_translates_pages_to_offsets() {
    let config = EngineConfig {
        pagination: PaginationConfig {
            style: PageStyle::Page,
            ..PaginationConfig::default()
        },
        ..EngineConfig::default()
    };
    let engine = QueryEngine::new(config, routes());
    let route = engine.parse_route("/api/v1/letters");
    let params = Params::parse_query("page=3&limit=20");
    let plan = engine
        .request(&catalog(), &route, params)
        .expect("resolves")
        .build()
        .expect("builds")
        .paginate(None)
        .expect("paginates")
        .into_plan();

    let sql = plan.to_query_string(&catalog()).expect("renders");
    assert!(sql.contains("LIMIT 20"), "{sql}");
    assert!(sql.contains("OFFSET 40"), "{sql}");
}

// -------------------------------------------------------------------------
// Failure modes
// -------------------------------------------------------------------------

#[test]
fn unknown_route_is_rejected_before_any_building() {
    assert!(matches!(
        build("/api/v1/packages", ""),
        Err(QueryError::RouteNotRegistered(_))
    ));
}

#[test]
fn absent_parent_record_fails_the_request() {
    assert!(matches!(
        build("/api/v1/letters/99/photos", ""),
        Err(QueryError::ParentRecordNotFound { key: 99, .. })
    ));
}

#[test]
fn unknown_refinement_fails_the_request() {
    assert!(matches!(
        build("/api/v1/letters", "filterNope=1"),
        Err(QueryError::UnknownRefinement(_))
    ));
}

#[test]
fn malformed_between_fails_the_request() {
    assert!(matches!(
        build("/api/v1/letters", "betweenLetterId[]=4"),
        Err(QueryError::MalformedParameter { .. })
    ));
}

#[test]
fn malformed_limit_fails_pagination() {
    let engine = engine();
    let catalog = catalog();
    let route = engine.parse_route("/api/v1/letters");
    let params = Params::parse_query("limit=lots");
    let result = engine
        .request(&catalog, &route, params)
        .expect("resolves")
        .build()
        .expect("builds")
        .paginate(None);
    assert!(matches!(result, Err(QueryError::MalformedParameter { .. })));
}
