//! Shared test fixtures

#![allow(dead_code)]

use entrepot::memory::MemoryStore;
use entrepot::{Entity, Session, Value};
use fake::Fake;
use fake::faker::name::en::Name;

/// Test entity mirroring a minimal sales order
#[derive(Debug, Clone, PartialEq)]
pub struct Order {
    pub id: i64,
    pub customer: String,
    pub status: String,
    pub total: f64,
}

impl Entity for Order {
    type Key = i64;
    const KIND: &'static str = "orders";

    fn key(&self) -> i64 {
        self.id
    }

    fn attribute(&self, name: &str) -> Option<Value> {
        match name {
            "id" => Some(Value::Int(self.id)),
            "customer" => Some(Value::Text(self.customer.clone())),
            "status" => Some(Value::Text(self.status.clone())),
            "total" => Some(Value::Float(self.total)),
            _ => None,
        }
    }
}

pub fn order(id: i64, status: &str) -> Order {
    Order {
        id,
        customer: Name().fake(),
        status: status.to_string(),
        total: (10..5000).fake::<i64>() as f64 / 100.0,
    }
}

/// Fresh store pre-populated with the given orders
pub async fn seeded_store(orders: &[Order]) -> MemoryStore {
    let store = MemoryStore::default();
    let mut session = store.session::<Order>();
    session
        .persist(orders)
        .await
        .expect("seeding must not fail");
    session.close().await;
    store
}

/// Order-independent equality of two entity collections
pub fn same_set(mut a: Vec<Order>, mut b: Vec<Order>) -> bool {
    a.sort_by_key(|o| o.id);
    b.sort_by_key(|o| o.id);
    a == b
}
