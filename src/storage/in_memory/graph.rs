use std::collections::HashMap;

use async_trait::async_trait;
use petgraph::graph::EdgeIndex;
use petgraph::graph::NodeIndex;
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use petgraph::Graph;
use tokio::sync::RwLock;
use tracing::debug;

use crate::constants::ACCOUNTS_COLLECTION;
use crate::constants::HOTSPOTS_COLLECTION;
use crate::constants::PAYMENTS_COLLECTION;
use crate::constants::POC_RECEIPTS_COLLECTION;
use crate::error::Result;
use crate::model::record::vertex_id;
use crate::model::AccountRecord;
use crate::model::BlockRecords;
use crate::model::FollowerInfo;
use crate::model::HotspotRecord;
use crate::model::PaymentEdge;
use crate::model::ReceiptEdge;
use crate::storage::GraphStore;

#[derive(Debug, Clone, PartialEq)]
pub enum Vertex {
    Account(AccountRecord),
    Hotspot(HotspotRecord),
}

impl Vertex {
    // Edges may point at a vertex nobody wrote yet
    fn placeholder(id: &str) -> Self {
        match id.split_once('/') {
            Some((HOTSPOTS_COLLECTION, key)) => Vertex::Hotspot(HotspotRecord::bare(key)),
            Some((_, key)) => Vertex::Account(AccountRecord::new(key)),
            None => Vertex::Account(AccountRecord::new(id)),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Edge {
    Payment(PaymentEdge),
    Receipt(ReceiptEdge),
}

#[derive(Debug, Default)]
struct GraphState {
    graph: Graph<Vertex, Edge>,
    vertices: HashMap<String, NodeIndex>,
    edges: HashMap<String, EdgeIndex>,
    follower_info: Option<FollowerInfo>,
    collections_ready: bool,
}

impl GraphState {
    fn insert_vertex_if_absent(
        &mut self,
        id: String,
        vertex: Vertex,
    ) -> NodeIndex {
        if let Some(&idx) = self.vertices.get(&id) {
            return idx;
        }
        let idx = self.graph.add_node(vertex);
        self.vertices.insert(id, idx);
        idx
    }

    fn vertex_index(
        &mut self,
        id: &str,
    ) -> NodeIndex {
        self.insert_vertex_if_absent(id.to_string(), Vertex::placeholder(id))
    }

    fn insert_edge_if_absent(
        &mut self,
        id: String,
        from: &str,
        to: &str,
        edge: Edge,
    ) {
        if self.edges.contains_key(&id) {
            return;
        }
        let from = self.vertex_index(from);
        let to = self.vertex_index(to);
        let idx = self.graph.add_edge(from, to, edge);
        self.edges.insert(id, idx);
    }

    fn count_vertices(
        &self,
        pred: impl Fn(&Vertex) -> bool,
    ) -> usize {
        self.graph.node_weights().filter(|v| pred(v)).count()
    }

    fn count_edges(
        &self,
        pred: impl Fn(&Edge) -> bool,
    ) -> usize {
        self.graph.edge_weights().filter(|e| pred(e)).count()
    }
}

/// petgraph-backed store with the same upsert semantics as the PostgreSQL one
#[derive(Debug, Default)]
pub struct InMemoryGraphStore {
    state: RwLock<GraphState>,
}

impl InMemoryGraphStore {
    pub fn new() -> Self { Self::default() }

    pub async fn account_count(&self) -> usize {
        self.state.read().await.count_vertices(|v| matches!(v, Vertex::Account(_)))
    }

    pub async fn hotspot_count(&self) -> usize {
        self.state.read().await.count_vertices(|v| matches!(v, Vertex::Hotspot(_)))
    }

    pub async fn payment_count(&self) -> usize {
        self.state.read().await.count_edges(|e| matches!(e, Edge::Payment(_)))
    }

    pub async fn receipt_count(&self) -> usize {
        self.state.read().await.count_edges(|e| matches!(e, Edge::Receipt(_)))
    }

    pub async fn hotspot(
        &self,
        address: &str,
    ) -> Option<HotspotRecord> {
        let state = self.state.read().await;
        let idx = state.vertices.get(&vertex_id(HOTSPOTS_COLLECTION, address))?;
        match &state.graph[*idx] {
            Vertex::Hotspot(hotspot) => Some(hotspot.clone()),
            Vertex::Account(_) => None,
        }
    }

    /// Payments leaving `payer`, in insertion order
    pub async fn payments_from(
        &self,
        payer: &str,
    ) -> Vec<PaymentEdge> {
        let state = self.state.read().await;
        let Some(idx) = state.vertices.get(&vertex_id(ACCOUNTS_COLLECTION, payer)) else {
            return vec![];
        };
        let mut payments: Vec<(EdgeIndex, PaymentEdge)> = state
            .graph
            .edges_directed(*idx, Direction::Outgoing)
            .filter_map(|edge| match edge.weight() {
                Edge::Payment(payment) => Some((edge.id(), payment.clone())),
                Edge::Receipt(_) => None,
            })
            .collect();
        payments.sort_by_key(|(idx, _)| *idx);
        payments.into_iter().map(|(_, payment)| payment).collect()
    }

    pub async fn collections_ready(&self) -> bool { self.state.read().await.collections_ready }

    pub async fn follower_info(&self) -> Option<FollowerInfo> { self.state.read().await.follower_info }
}

#[async_trait]
impl GraphStore for InMemoryGraphStore {
    async fn ensure_collections(&self) -> Result<()> {
        self.state.write().await.collections_ready = true;
        Ok(())
    }

    async fn load_follower_info(&self) -> Result<Option<FollowerInfo>> { Ok(self.state.read().await.follower_info) }

    async fn save_follower_info(
        &self,
        info: &FollowerInfo,
    ) -> Result<()> {
        self.state.write().await.follower_info = Some(*info);
        Ok(())
    }

    async fn commit_block(
        &self,
        records: &BlockRecords,
    ) -> Result<()> {
        let mut state = self.state.write().await;

        for account in records.accounts() {
            state.insert_vertex_if_absent(vertex_id(ACCOUNTS_COLLECTION, &account.key), Vertex::Account(account.clone()));
        }
        for hotspot in records.hotspots() {
            state.insert_vertex_if_absent(vertex_id(HOTSPOTS_COLLECTION, &hotspot.key), Vertex::Hotspot(hotspot.clone()));
        }
        for payment in records.payments() {
            state.insert_edge_if_absent(
                vertex_id(PAYMENTS_COLLECTION, &payment.key),
                &payment.from,
                &payment.to,
                Edge::Payment(payment.clone()),
            );
        }
        for receipt in records.receipts() {
            state.insert_edge_if_absent(
                vertex_id(POC_RECEIPTS_COLLECTION, &receipt.key),
                &receipt.from,
                &receipt.to,
                Edge::Receipt(receipt.clone()),
            );
        }

        debug!("in_memory::block_committed::{}", records.height);
        Ok(())
    }

    async fn replace_hotspots(
        &self,
        hotspots: &[HotspotRecord],
    ) -> Result<()> {
        let mut state = self.state.write().await;
        for hotspot in hotspots {
            let id = vertex_id(HOTSPOTS_COLLECTION, &hotspot.key);
            match state.vertices.get(&id).copied() {
                Some(idx) => state.graph[idx] = Vertex::Hotspot(hotspot.clone()),
                None => {
                    state.insert_vertex_if_absent(id, Vertex::Hotspot(hotspot.clone()));
                },
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::model::NormalizedRecords;

    fn block_with_payment(height: u64) -> BlockRecords {
        let mut records = BlockRecords::new(height);
        records.merge(NormalizedRecords {
            accounts: vec![AccountRecord::new("alice"), AccountRecord::new("bob")],
            hotspots: vec![HotspotRecord::bare("hs1")],
            payments: vec![PaymentEdge::new("alice", "bob", "h", 5, height, 100).unwrap()],
            receipts: vec![],
        });
        records
    }

    #[tokio::test]
    async fn commit_is_idempotent() {
        let store = InMemoryGraphStore::new();
        store.commit_block(&block_with_payment(1)).await.unwrap();
        store.commit_block(&block_with_payment(1)).await.unwrap();

        assert_eq!(store.account_count().await, 2);
        assert_eq!(store.hotspot_count().await, 1);
        assert_eq!(store.payment_count().await, 1);
        assert_eq!(store.payments_from("alice").await.len(), 1);
    }

    #[tokio::test]
    async fn bare_upsert_keeps_inventory_fields() {
        let store = InMemoryGraphStore::new();
        let enriched = HotspotRecord {
            owner: Some("X".to_string()),
            ..HotspotRecord::bare("hs1")
        };
        store.replace_hotspots(&[enriched.clone()]).await.unwrap();
        store.commit_block(&block_with_payment(2)).await.unwrap();

        assert_eq!(store.hotspot("hs1").await, Some(enriched));
    }

    #[tokio::test]
    async fn inventory_replaces_bare_record() {
        let store = InMemoryGraphStore::new();
        store.commit_block(&block_with_payment(2)).await.unwrap();
        let enriched = HotspotRecord {
            owner: Some("Y".to_string()),
            name: Some("fancy-name".to_string()),
            ..HotspotRecord::bare("hs1")
        };
        store.replace_hotspots(&[enriched.clone()]).await.unwrap();

        assert_eq!(store.hotspot_count().await, 1);
        assert_eq!(store.hotspot("hs1").await, Some(enriched));
    }

    #[tokio::test]
    async fn checkpoint_is_replaced() {
        let store = InMemoryGraphStore::new();
        assert_eq!(store.load_follower_info().await.unwrap(), None);

        let mut info = FollowerInfo {
            height: 10,
            first_block: 1,
            sync_height: 2,
            inventory_height: 0,
        };
        store.save_follower_info(&info).await.unwrap();
        info.sync_height = 3;
        store.save_follower_info(&info).await.unwrap();

        assert_eq!(store.load_follower_info().await.unwrap(), Some(info));
    }
}
