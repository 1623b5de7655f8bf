use herald_domain::domain_event::{DomainEvent, Event, EventMetadata};
use herald_domain::error::DomainError;
use herald_domain::event_upcaster::{EventUpcaster, EventUpcasterChain, FnUpcaster};
use herald_domain::eventing::{
    EventBus, EventBusConfig, EventSubscriber, HandlerFuture, InMemoryDeadLetterQueue,
    InMemoryEventBus, SubscribeOptions, SubscriberBinding, UpcastingHandler, handler_fn,
};
use herald_domain::persist::{EventQuery, EventStore, InMemoryEventStore};
use herald_domain::retry::{BackoffKind, RetryPolicy};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Serialize, Deserialize)]
struct TaskCreatedV1 {
    name: String,
}

impl DomainEvent for TaskCreatedV1 {
    const EVENT_TYPE: &'static str = "task.created";
    const AGGREGATE_TYPE: &'static str = "task";
}

#[derive(Debug, Serialize, Deserialize)]
struct TaskCreated {
    title: String,
    assignee: Option<String>,
}

impl DomainEvent for TaskCreated {
    const EVENT_TYPE: &'static str = "task.created";
    const AGGREGATE_TYPE: &'static str = "task";
    const VERSION: &'static str = "2.0";
}

#[derive(Debug, Serialize, Deserialize)]
struct TaskCompleted {
    completed_by: String,
}

impl DomainEvent for TaskCompleted {
    const EVENT_TYPE: &'static str = "task.completed";
    const AGGREGATE_TYPE: &'static str = "task";
}

/// 任务看板投影：显式声明自己关心的事件
#[derive(Default)]
struct TaskBoard {
    open: Mutex<Vec<String>>,
    completed: AtomicUsize,
}

impl TaskBoard {
    fn on_created(self: Arc<Self>, event: Event) -> HandlerFuture {
        Box::pin(async move {
            let created: TaskCreated = event.payload_as()?;
            self.open
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .push(created.title);
            Ok(())
        })
    }

    fn on_completed(self: Arc<Self>, _event: Event) -> HandlerFuture {
        Box::pin(async move {
            self.completed.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
    }
}

impl EventSubscriber for TaskBoard {
    fn bindings() -> Vec<SubscriberBinding<Self>> {
        vec![SubscriberBinding::new("task.completed", "board.completed", Self::on_completed)]
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn upcasters() -> EventUpcasterChain {
    let chain = EventUpcasterChain::new();
    chain.register(Arc::new(FnUpcaster::new(
        "task.created",
        "1.0",
        "2.0",
        |mut payload: Value| {
            if let Some(obj) = payload.as_object_mut() {
                if let Some(name) = obj.remove("name") {
                    obj.insert("title".into(), name);
                }
                obj.entry("assignee").or_insert(Value::Null);
            }
            Ok(payload)
        },
    )) as Arc<dyn EventUpcaster>);
    chain
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let store = Arc::new(InMemoryEventStore::with_capacity(1_000));
    let dead_letters = Arc::new(InMemoryDeadLetterQueue::new());
    let chain = Arc::new(upcasters());

    let retry = RetryPolicy::builder()
        .max_attempts(3)
        .backoff(BackoffKind::Exponential)
        .initial_delay(Duration::from_millis(50))
        .max_delay(Duration::from_secs(1))
        .build()?;
    let bus = InMemoryEventBus::builder()
        .event_store(store.clone())
        .dead_letter_sink(dead_letters.clone())
        .config(
            EventBusConfig::builder()
                .max_concurrency(4)
                .handler_timeout(Duration::from_secs(2))
                .build(),
        )
        .build();

    // 看板：completed 走显式绑定，created 经上抬后投递 2.0 版本
    let board = Arc::new(TaskBoard::default());
    bus.register_subscriber(board.clone())?;
    let created_handler = {
        let board = board.clone();
        handler_fn("board.created", move |event: Event| board.clone().on_created(event))
    };
    bus.subscribe(
        "task.created",
        Arc::new(UpcastingHandler::new(created_handler, chain.clone(), "2.0")),
        SubscribeOptions::default(),
    )?;

    // 通知服务：前两次失败，第三次成功
    let notify_calls = Arc::new(AtomicUsize::new(0));
    let calls = notify_calls.clone();
    bus.subscribe(
        "task.*",
        handler_fn("notifications", move |event: Event| {
            let calls = calls.clone();
            async move {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                if n <= 2 {
                    return Err(DomainError::transient("mail relay unavailable"));
                }
                tracing::info!(event_type = event.event_type(), "notification sent");
                Ok(())
            }
        }),
        SubscribeOptions::builder().retry_policy(retry).build(),
    )?;

    // 审计写入始终失败，最终进入死信
    bus.subscribe(
        "**",
        handler_fn("audit", |_event: Event| async {
            Err(DomainError::transient("audit store offline"))
        }),
        SubscribeOptions::builder()
            .retry_policy(RetryPolicy::builder().max_attempts(2).build()?)
            .build(),
    )?;

    let legacy = Event::from_domain(
        &TaskCreatedV1 {
            name: "migrate billing".into(),
        },
        "task-1",
        EventMetadata::builder().source("legacy-importer").build(),
    )?;
    let current = Event::from_domain(
        &TaskCreated {
            title: "write release notes".into(),
            assignee: Some("ops".into()),
        },
        "task-2",
        EventMetadata::builder().source("tasks").build(),
    )?;
    let completed = Event::from_domain(
        &TaskCompleted {
            completed_by: "ops".into(),
        },
        "task-1",
        EventMetadata::builder().source("tasks").build(),
    )?;

    for report in bus.publish_batch(&[legacy, current, completed]).await? {
        tracing::info!(
            event_id = %report.event_id,
            handlers = report.handlers,
            succeeded = report.succeeded,
            failed = report.failed.len(),
            "published"
        );
    }

    let open = board.open.lock().unwrap_or_else(|e| e.into_inner()).clone();
    tracing::info!(?open, completed = board.completed.load(Ordering::SeqCst), "task board");

    let task_1 = store
        .get_events(&EventQuery::builder().aggregate_id("task-1").build())
        .await?;
    tracing::info!(
        stored = store.count().await?,
        task_1 = task_1.len(),
        total_events = bus.total_events(),
        failed_deliveries = bus.failed_deliveries(),
        "bus stats"
    );

    for envelope in dead_letters.drain() {
        tracing::warn!(
            event_type = envelope.original_event_type(),
            handler = envelope.failed_handler().unwrap_or("unknown"),
            retry_count = envelope.retry_count(),
            error = envelope.error().unwrap_or_default(),
            "dead letter"
        );
    }

    Ok(())
}
