//! Relationship interface step definitions.

use std::collections::HashMap;
use std::fmt;

use cucumber::{given, then, when, World};
use tokio::task::JoinHandle;
use uuid::Uuid;

use socialgraph::graph::{Actor, EdgeState, Friend};
use socialgraph::notification::NotificationCode;
use socialgraph::relationships::RelationshipError;
use socialgraph::social::ExternalFriend;
use socialgraph::test_utils::{count_of, edge_of, seed_edge, seed_user, TestGraph};

/// Test context for relationship scenarios.
#[derive(World)]
#[world(init = Self::new)]
pub struct RelationshipWorld {
    graph: Option<TestGraph>,
    users: HashMap<String, Uuid>,
    external_ids: HashMap<String, String>,
    last_error: Option<RelationshipError>,
    last_list: Vec<Friend>,
    pending: Vec<JoinHandle<()>>,
}

impl fmt::Debug for RelationshipWorld {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RelationshipWorld")
            .field("users", &self.users)
            .field("last_error", &self.last_error)
            .field("last_list", &self.last_list)
            .finish()
    }
}

impl RelationshipWorld {
    fn new() -> Self {
        Self {
            graph: None,
            users: HashMap::new(),
            external_ids: HashMap::new(),
            last_error: None,
            last_list: Vec::new(),
            pending: Vec::new(),
        }
    }

    fn graph(&self) -> &TestGraph {
        self.graph.as_ref().expect("Social graph not initialized")
    }

    fn id(&self, name: &str) -> Uuid {
        *self
            .users
            .get(name)
            .unwrap_or_else(|| panic!("Unknown user {}", name))
    }

    fn actor(&self, name: &str) -> Actor {
        Actor::new(self.id(name), name)
    }

    /// Id of a known user, or a fresh id for an unregistered name.
    fn target(&self, name: &str) -> Uuid {
        self.users.get(name).copied().unwrap_or_else(Uuid::new_v4)
    }

    fn record<T>(&mut self, result: Result<T, RelationshipError>) -> Option<T> {
        match result {
            Ok(value) => {
                self.last_error = None;
                Some(value)
            }
            Err(e) => {
                self.last_error = Some(e);
                None
            }
        }
    }

    async fn settle(&mut self) {
        for handle in self.pending.drain(..) {
            handle.await.expect("dispatch task panicked");
        }
    }

    async fn notifications(&mut self, name: &str, code: NotificationCode) -> usize {
        self.settle().await;
        let id = self.id(name);
        self.graph()
            .sender
            .sent()
            .await
            .iter()
            .filter(|n| n.user_id == id && n.code == code)
            .count()
    }
}

// ==========================================================================
// Background
// ==========================================================================

#[given("a social graph")]
async fn given_social_graph(world: &mut RelationshipWorld) {
    let graph = TestGraph::new().await.expect("Failed to open store");
    world.graph = Some(graph);
}

#[given(expr = "a user {string} linked to external account {string}")]
async fn given_user(world: &mut RelationshipWorld, name: String, external_id: String) {
    let id = seed_user(&world.graph().store, &name, Some(&external_id))
        .await
        .expect("Failed to seed user");
    world.users.insert(name.clone(), id);
    world.external_ids.insert(name, external_id);
}

#[given(expr = "{string} has blocked {string} without a reciprocal edge")]
async fn given_blocked(world: &mut RelationshipWorld, blocker: String, blocked: String) {
    let (source, destination) = (world.id(&blocker), world.id(&blocked));
    seed_edge(&world.graph().store, source, destination, EdgeState::Blocked)
        .await
        .expect("Failed to seed edge");
}

#[given(expr = "{string} has a connected edge to {string}")]
async fn given_connected_edge(world: &mut RelationshipWorld, from: String, to: String) {
    let (source, destination) = (world.id(&from), world.id(&to));
    seed_edge(&world.graph().store, source, destination, EdgeState::Connected)
        .await
        .expect("Failed to seed edge");
}

#[given(expr = "{string} has external contacts {string}")]
async fn given_external_contacts(world: &mut RelationshipWorld, _name: String, contacts: String) {
    let friends = contacts
        .split(',')
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(ExternalFriend::new)
        .collect();
    world.graph().social.set_friends(friends).await;
}

#[given("notification delivery is failing")]
async fn given_delivery_failing(world: &mut RelationshipWorld) {
    world.graph().sender.set_fail_on_send(true).await;
}

// ==========================================================================
// Operations
// ==========================================================================

#[given(expr = "{string} adds {string}")]
#[when(expr = "{string} adds {string}")]
async fn when_add(world: &mut RelationshipWorld, caller: String, target: String) {
    let actor = world.actor(&caller);
    let target = world.target(&target);
    let result = world.graph().pipeline.add_by_id(&actor, target).await;
    if let Some(outcome) = world.record(result) {
        world.pending.extend(outcome.dispatch);
    }
}

#[when(expr = "{string} adds {string} by handle")]
async fn when_add_by_handle(world: &mut RelationshipWorld, caller: String, handle: String) {
    let actor = world.actor(&caller);
    let result = world.graph().pipeline.add_by_handle(&actor, &handle).await;
    if let Some(outcome) = world.record(result) {
        world.pending.extend(outcome.dispatch);
    }
}

#[when(expr = "{string} removes {string}")]
async fn when_remove(world: &mut RelationshipWorld, caller: String, target: String) {
    let actor = world.actor(&caller);
    let target = world.target(&target);
    let result = world.graph().pipeline.remove(&actor, target).await;
    world.record(result);
}

#[given(expr = "{string} blocks {string}")]
#[when(expr = "{string} blocks {string}")]
async fn when_block(world: &mut RelationshipWorld, caller: String, target: String) {
    let actor = world.actor(&caller);
    let target = world.target(&target);
    let result = world.graph().pipeline.block(&actor, target).await;
    world.record(result);
}

#[when(expr = "{string} lists friends")]
async fn when_list(world: &mut RelationshipWorld, caller: String) {
    let id = world.id(&caller);
    let result = world.graph().pipeline.list(id).await;
    if let Some(friends) = world.record(result) {
        world.last_list = friends;
    }
}

#[when(expr = "{string} imports external contacts")]
async fn when_import(world: &mut RelationshipWorld, caller: String) {
    let actor = world.actor(&caller);
    let external_id = world
        .external_ids
        .get(&caller)
        .cloned()
        .unwrap_or_default();
    let result = world
        .graph()
        .merger
        .merge(&actor, &external_id, "access-token")
        .await;
    if let Some(outcome) = world.record(result) {
        world.pending.extend(outcome.dispatch);
    }
}

// ==========================================================================
// Outcomes
// ==========================================================================

#[then("the operation succeeds")]
async fn then_succeeds(world: &mut RelationshipWorld) {
    assert!(
        world.last_error.is_none(),
        "expected success, got {:?}",
        world.last_error
    );
}

#[then("the operation fails as blocked")]
async fn then_fails_blocked(world: &mut RelationshipWorld) {
    assert!(
        matches!(world.last_error, Some(RelationshipError::Blocked)),
        "expected Blocked, got {:?}",
        world.last_error
    );
}

#[then("the operation fails as not found")]
async fn then_fails_not_found(world: &mut RelationshipWorld) {
    assert!(
        matches!(world.last_error, Some(RelationshipError::NotFound(_))),
        "expected NotFound, got {:?}",
        world.last_error
    );
}

#[then("the operation fails as invalid input")]
async fn then_fails_validation(world: &mut RelationshipWorld) {
    assert!(
        matches!(world.last_error, Some(RelationshipError::Validation(_))),
        "expected Validation, got {:?}",
        world.last_error
    );
}

// ==========================================================================
// Edges and counters
// ==========================================================================

async fn edge_state(world: &RelationshipWorld, from: &str, to: &str) -> Option<EdgeState> {
    edge_of(&world.graph().store, world.id(from), world.id(to))
        .await
        .expect("Failed to read edge")
        .map(|edge| edge.state)
}

#[then(expr = "{string} and {string} are friends")]
async fn then_friends(world: &mut RelationshipWorld, a: String, b: String) {
    assert_eq!(edge_state(world, &a, &b).await, Some(EdgeState::Connected));
    assert_eq!(edge_state(world, &b, &a).await, Some(EdgeState::Connected));
}

#[then(expr = "there is no edge from {string} to {string}")]
async fn then_no_edge(world: &mut RelationshipWorld, from: String, to: String) {
    assert_eq!(edge_state(world, &from, &to).await, None);
}

#[then(expr = "the edge from {string} to {string} is blocked")]
async fn then_edge_blocked(world: &mut RelationshipWorld, from: String, to: String) {
    assert_eq!(edge_state(world, &from, &to).await, Some(EdgeState::Blocked));
}

#[then(expr = "{string} has {int} edge(s)")]
async fn then_edge_count(world: &mut RelationshipWorld, name: String, expected: i64) {
    let count = count_of(&world.graph().store, world.id(&name))
        .await
        .expect("Failed to read counter");
    assert_eq!(count, expected, "edge counter for {}", name);
}

#[then(expr = "the friend list is {string}")]
async fn then_friend_list(world: &mut RelationshipWorld, expected: String) {
    let actual: Vec<String> = world
        .last_list
        .iter()
        .map(|friend| {
            let state = match friend.state {
                EdgeState::Connected => "connected",
                EdgeState::Blocked => "blocked",
            };
            format!("{}:{}", friend.user.handle, state)
        })
        .collect();
    let expected: Vec<String> = expected.split(',').map(|s| s.trim().to_string()).collect();
    assert_eq!(actual, expected);
}

// ==========================================================================
// Notifications
// ==========================================================================

#[then(expr = "{string} received {int} friend added notification(s)")]
async fn then_friend_added(world: &mut RelationshipWorld, name: String, expected: usize) {
    let count = world.notifications(&name, NotificationCode::FriendAdded).await;
    assert_eq!(count, expected);
}

#[then(expr = "{string} received {int} friend joined notification(s)")]
async fn then_friend_joined(world: &mut RelationshipWorld, name: String, expected: usize) {
    let count = world
        .notifications(&name, NotificationCode::FriendJoinGame)
        .await;
    assert_eq!(count, expected);
}
