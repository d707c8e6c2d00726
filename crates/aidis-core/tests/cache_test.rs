use aidis_core::cache::{ContextSearchFilter, StorageGateway};
use aidis_core::types::*;

#[tokio::test]
async fn context_round_trip_scenario() {
    let db = StorageGateway::new_in_memory().await.unwrap();

    let alpha = Project::new("alpha");
    db.create_project(&alpha).await.unwrap();

    let mut ctx = Context::new(alpha.id, ContextType::Code, "Implemented JWT refresh flow");
    ctx.tags = vec!["auth".into(), "jwt".into()];
    ctx.embedding = Some(vec![0.1; CONTEXT_EMBEDDING_DIM]);
    db.insert_context(&ctx).await.unwrap();

    let recent = db.get_recent_contexts(alpha.id, 5).await.unwrap();
    assert_eq!(recent[0].id, ctx.id);

    let hits = db
        .search_contexts(
            alpha.id,
            vec![0.1; CONTEXT_EMBEDDING_DIM],
            ContextSearchFilter::default(),
            5,
            0.5,
        )
        .await
        .unwrap();
    assert!(!hits.is_empty());
    assert!(hits[0].context.content.contains("JWT refresh"));
    assert!(hits[0].similarity >= 0.5);
}

#[tokio::test]
async fn project_isolation_scenario() {
    let db = StorageGateway::new_in_memory().await.unwrap();

    let alpha = Project::new("alpha");
    let beta = Project::new("beta");
    db.create_project(&alpha).await.unwrap();
    db.create_project(&beta).await.unwrap();

    let mut ctx = Context::new(alpha.id, ContextType::Code, "alpha-only content");
    ctx.embedding = Some(vec![0.3; CONTEXT_EMBEDDING_DIM]);
    db.insert_context(&ctx).await.unwrap();

    let beta_hits = db
        .search_contexts(
            beta.id,
            vec![0.3; CONTEXT_EMBEDDING_DIM],
            ContextSearchFilter::default(),
            10,
            0.0,
        )
        .await
        .unwrap();
    assert!(beta_hits.is_empty());
}

#[tokio::test]
async fn project_create_duplicate_name_is_conflict() {
    let db = StorageGateway::new_in_memory().await.unwrap();
    db.create_project(&Project::new("dup")).await.unwrap();
    let err = db.create_project(&Project::new("dup")).await.unwrap_err();
    assert!(matches!(
        err,
        aidis_core::cache::StorageError::Conflict(_)
    ));
}

#[tokio::test]
async fn project_delete_cascades_to_children() {
    let db = StorageGateway::new_in_memory().await.unwrap();
    let p = Project::new("alpha");
    db.create_project(&p).await.unwrap();

    let mut ctx = Context::new(p.id, ContextType::Code, "some content");
    ctx.embedding = Some(vec![0.5; CONTEXT_EMBEDDING_DIM]);
    db.insert_context(&ctx).await.unwrap();

    let task = Task::new(p.id, "task", "chore");
    db.insert_task(&task).await.unwrap();

    db.delete_project(p.id).await.unwrap();

    assert!(db.get_project(p.id).await.unwrap().is_none());
    assert!(db.get_task(task.id).await.unwrap().is_none());
    let remaining = db.get_recent_contexts(p.id, 10).await.unwrap();
    assert!(remaining.is_empty());
}

#[tokio::test]
async fn decision_outcome_update_scenario() {
    let db = StorageGateway::new_in_memory().await.unwrap();
    let p = Project::new("alpha");
    db.create_project(&p).await.unwrap();

    let decision = Decision {
        id: uuid::Uuid::new_v4(),
        project_id: p.id,
        decision_type: DecisionType::Database,
        title: "Choose Postgres".into(),
        description: "picked postgres".into(),
        rationale: "mature ecosystem".into(),
        impact_level: ImpactLevel::High,
        alternatives_considered: vec![],
        problem_statement: None,
        affected_components: vec![],
        tags: vec![],
        outcome_status: OutcomeStatus::Unknown,
        outcome_notes: None,
        lessons_learned: None,
        decision_date: chrono::Utc::now(),
    };
    db.insert_decision(&decision).await.unwrap();

    db.update_decision_outcome(
        decision.id,
        Some(OutcomeStatus::Successful),
        None,
        Some("Indexed vectors pay off".into()),
    )
    .await
    .unwrap();

    let (_, _, _, success_rate) = db.decision_stats(p.id).await.unwrap();
    assert_eq!(success_rate, 100.0);

    let fetched = db.get_decision(decision.id).await.unwrap().unwrap();
    assert_eq!(fetched.title, "Choose Postgres");
    assert_eq!(fetched.outcome_status, OutcomeStatus::Successful);
    assert_eq!(
        fetched.lessons_learned.as_deref(),
        Some("Indexed vectors pay off")
    );
}

#[tokio::test]
async fn task_bulk_update_atomic_scenario() {
    let db = StorageGateway::new_in_memory().await.unwrap();
    let p = Project::new("alpha");
    db.create_project(&p).await.unwrap();

    let t1 = Task::new(p.id, "T1", "chore");
    let t2 = Task::new(p.id, "T2", "chore");
    let t3 = Task::new(p.id, "T3", "chore");
    db.insert_task(&t1).await.unwrap();
    db.insert_task(&t2).await.unwrap();
    db.insert_task(&t3).await.unwrap();

    let bogus = uuid::Uuid::new_v4();
    let result = db
        .bulk_update_task_status(vec![t1.id, t2.id, bogus], TaskStatus::Completed)
        .await;
    assert!(result.is_err());

    for t in [&t1, &t2, &t3] {
        let fetched = db.get_task(t.id).await.unwrap().unwrap();
        assert_eq!(fetched.status, TaskStatus::Todo);
    }
}
