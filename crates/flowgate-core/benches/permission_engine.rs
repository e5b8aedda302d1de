use std::collections::HashMap;
use std::sync::Arc;

use criterion::{Criterion, criterion_group, criterion_main};

use flowgate_core::engine::{
    CasePermissionEngine, CaseReader, LookupError, ModuleGrants, StagePermissionEngine,
    StageReader, WorkflowPermissionEngine, WorkflowReader,
};
use flowgate_core::{
    Case, EntityId, OperationType, Stage, UserContext, ViewPermissionMode, Workflow,
};

#[derive(Default)]
struct TestStore {
    workflows: HashMap<EntityId, Workflow>,
    stages: HashMap<EntityId, Stage>,
    cases: HashMap<EntityId, Case>,
}

impl WorkflowReader for TestStore {
    async fn workflow(&self, id: EntityId) -> Result<Option<Workflow>, LookupError> {
        Ok(self.workflows.get(&id).cloned())
    }
}

impl StageReader for TestStore {
    async fn stage(&self, id: EntityId) -> Result<Option<Stage>, LookupError> {
        Ok(self.stages.get(&id).cloned())
    }
}

impl CaseReader for TestStore {
    async fn case(&self, id: EntityId) -> Result<Option<Case>, LookupError> {
        Ok(self.cases.get(&id).cloned())
    }
}

fn team_list(prefix: &str, n: usize) -> String {
    let ids: Vec<String> = (0..n).map(|i| format!("{prefix}{i}")).collect();
    serde_json::to_string(&ids).unwrap()
}

fn make_workflows(n: i64) -> Vec<Workflow> {
    (0..n)
        .map(|id| Workflow {
            id,
            name: format!("workflow-{id}"),
            view_permission_mode: match id % 4 {
                0 => ViewPermissionMode::Public,
                1 => ViewPermissionMode::VisibleToTeams,
                2 => ViewPermissionMode::InvisibleToTeams,
                _ => ViewPermissionMode::Private,
            },
            view_teams: Some(team_list("team", 20)),
            operate_teams: Some(team_list("team", 5)),
            create_user_id: Some(id),
        })
        .collect()
}

fn make_store() -> TestStore {
    let workflows = make_workflows(10);
    let stages = (0..1000)
        .map(|id| Stage {
            id,
            workflow_id: id % 10,
            view_teams: (id % 2 == 0).then(|| team_list("team", 10)),
            ..Default::default()
        })
        .collect::<Vec<_>>();
    let cases = (0..1000)
        .map(|id| Case {
            id,
            workflow_id: id % 10,
            view_permission_mode: if id % 3 == 0 {
                ViewPermissionMode::VisibleToTeams
            } else {
                ViewPermissionMode::Public
            },
            view_teams: Some(team_list("team", 10)),
            operate_teams: Some(team_list("team", 3)),
            ..Default::default()
        })
        .collect::<Vec<_>>();

    TestStore {
        workflows: workflows.into_iter().map(|w| (w.id, w)).collect(),
        stages: stages.into_iter().map(|s| (s.id, s)).collect(),
        cases: cases.into_iter().map(|c| (c.id, c)).collect(),
    }
}

fn user() -> UserContext {
    UserContext::new("7").in_teams(["team3", "team12", "sales"])
}

fn bench_check_workflow(c: &mut Criterion) {
    let engine = WorkflowPermissionEngine::new(Arc::new(TestStore::default()));
    let workflow = make_workflows(2).remove(1);
    let ctx = user();

    c.bench_function("check_workflow_operate", |b| {
        b.iter(|| engine.check_workflow_permission(&workflow, &ctx, OperationType::Operate));
    });
}

fn bench_check_stage(c: &mut Criterion) {
    let store = Arc::new(make_store());
    let engine = StagePermissionEngine::new(Arc::clone(&store), Arc::clone(&store));
    let stage = store.stages[&2].clone();
    let workflow = store.workflows[&2].clone();
    let ctx = user();

    c.bench_function("check_stage_operate", |b| {
        b.iter(|| {
            engine.check_stage_permission(&stage, &workflow, &ctx, OperationType::Operate, None)
        });
    });
}

fn bench_check_case(c: &mut Criterion) {
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();
    let store = Arc::new(make_store());
    let engine = CasePermissionEngine::new(Arc::clone(&store), Arc::clone(&store));
    let case = store.cases[&1].clone();
    let ctx = user();

    c.bench_function("check_case_inherited", |b| {
        b.to_async(&rt).iter(|| async {
            engine
                .check_case_permission(&case, &ctx, OperationType::Operate)
                .await
        });
    });
}

fn bench_batch_workflows_1000(c: &mut Criterion) {
    let engine = WorkflowPermissionEngine::new(Arc::new(TestStore::default()));
    let workflows = make_workflows(1000);
    let ctx = user();

    c.bench_function("batch_workflows_1000", |b| {
        b.iter(|| engine.check_batch_workflow_permissions(&workflows, &ctx, ModuleGrants::ALL));
    });
}

fn bench_batch_stages_1000(c: &mut Criterion) {
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();
    let store = Arc::new(make_store());
    let engine = StagePermissionEngine::new(Arc::clone(&store), Arc::clone(&store));
    let stages: Vec<Stage> = store.stages.values().cloned().collect();
    let ctx = user();

    c.bench_function("batch_stages_1000", |b| {
        b.to_async(&rt).iter(|| async {
            engine
                .check_batch_stage_permissions(&stages, &ctx, ModuleGrants::ALL)
                .await
        });
    });
}

fn bench_batch_cases_1000(c: &mut Criterion) {
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();
    let store = Arc::new(make_store());
    let engine = CasePermissionEngine::new(Arc::clone(&store), Arc::clone(&store));
    let cases: Vec<Case> = store.cases.values().cloned().collect();
    let ctx = user();

    c.bench_function("batch_cases_1000", |b| {
        b.to_async(&rt).iter(|| async {
            engine
                .check_batch_case_permissions(&cases, &ctx, ModuleGrants::ALL)
                .await
        });
    });
}

criterion_group!(
    benches,
    bench_check_workflow,
    bench_check_stage,
    bench_check_case,
    bench_batch_workflows_1000,
    bench_batch_stages_1000,
    bench_batch_cases_1000,
);
criterion_main!(benches);
