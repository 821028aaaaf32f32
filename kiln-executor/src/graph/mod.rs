//! Dependency graph construction and compilation.
//!
//! A [`Graph`] is a multigraph of operators. Each edge carries one mark from
//! a producer's product slot to a consumer's requisite slot; distinct marks
//! may connect the same ordered pair of operators any number of times.
//! Vertices are created the first time an operator is referenced and are
//! identified by the operator's [`EntityId`].

mod cycles;

pub use cycles::{Cycle, CycleReport};

use crate::context::Context;
use crate::schedule::{Item, Link, Schedule};
use kiln_core::error::{KilnError, Result};
use kiln_core::logging::{LogCategory, LogContext, LogEvent};
use kiln_core::mark::MarkRef;
use kiln_core::pack::{Getter, Schema, Selector, Setter};
use kiln_core::traits::{Operator, OperatorInfo};
use kiln_core::types::{EdgeId, EntityId, ScheduleId, VertexId};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::instrument;

/// An operator registered in a graph.
pub struct Vertex {
    operator: Arc<dyn Operator>,
    info: OperatorInfo,
    requisites: Schema,
    products: Schema,
    /// Mark declared on each product slot.
    declared: Vec<Option<MarkRef>>,
    /// Edge feeding each requisite slot.
    bound: Vec<Option<EdgeId>>,
    outgoing: Vec<EdgeId>,
    incoming: Vec<EdgeId>,
}

impl Vertex {
    /// The operator.
    pub fn operator(&self) -> &Arc<dyn Operator> {
        &self.operator
    }

    /// Operator metadata, captured at registration.
    pub fn info(&self) -> &OperatorInfo {
        &self.info
    }

    /// Requisite schema, captured at registration.
    pub fn requisite_schema(&self) -> &Schema {
        &self.requisites
    }

    /// Product schema, captured at registration.
    pub fn product_schema(&self) -> &Schema {
        &self.products
    }

    /// Mark declared on a product slot.
    pub fn declared_mark(&self, position: usize) -> Option<&MarkRef> {
        self.declared.get(position).and_then(Option::as_ref)
    }
}

impl std::fmt::Debug for Vertex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Vertex")
            .field("operator", &self.info.name)
            .field("incoming", &self.incoming.len())
            .field("outgoing", &self.outgoing.len())
            .finish()
    }
}

/// A dependency between two vertices, carrying one mark.
#[derive(Debug, Clone)]
pub struct Edge {
    /// The mark that flows along the edge.
    pub mark: MarkRef,
    /// Producer vertex.
    pub source: VertexId,
    /// Consumer vertex.
    pub target: VertexId,
    /// Reads the mark from the producer's products.
    pub getter: Getter,
    /// Writes the mark into the consumer's requisites.
    pub setter: Setter,
}

/// Static declared dependency graph.
pub struct Graph {
    vertices: Vec<Vertex>,
    edges: Vec<Edge>,
    index: HashMap<EntityId, VertexId>,
    log: LogContext,
}

impl Graph {
    /// Create an empty graph.
    pub fn new() -> Self {
        Self::with_log(LogContext::null())
    }

    /// Create an empty graph reporting diagnostics into `log`.
    pub fn with_log(log: LogContext) -> Self {
        Self {
            vertices: Vec::new(),
            edges: Vec::new(),
            index: HashMap::new(),
            log,
        }
    }

    /// Register an operator, returning its vertex.
    ///
    /// Registering the same operator again returns the existing vertex.
    pub fn add_operator(&mut self, operator: Arc<dyn Operator>) -> VertexId {
        if let Some(&vertex) = self.index.get(&operator.id()) {
            return vertex;
        }

        let vertex = VertexId::new(self.vertices.len() as u32);
        let info = operator.info();
        let requisites = operator.requisite_schema();
        let products = operator.product_schema();

        tracing::trace!(vertex = %vertex, operator = %info.name, "Vertex added");

        self.index.insert(operator.id(), vertex);
        self.vertices.push(Vertex {
            declared: vec![None; products.len()],
            bound: vec![None; requisites.len()],
            operator,
            info,
            requisites,
            products,
            outgoing: Vec::new(),
            incoming: Vec::new(),
        });
        vertex
    }

    /// Declare that `mark`, produced in `source`'s `product` slot, feeds
    /// `target`'s `requisite` slot.
    ///
    /// Both operators are registered if needed. Repeating an identical
    /// declaration returns the existing edge.
    ///
    /// # Errors
    ///
    /// Fails with a schema error if either selector does not resolve, or
    /// with [`KilnError::SlotAlreadyBound`] if the requisite slot is already
    /// fed by a different edge or the product slot already declares a
    /// different mark.
    pub fn add_edge(
        &mut self,
        source: &Arc<dyn Operator>,
        product: impl Into<Selector>,
        target: &Arc<dyn Operator>,
        requisite: impl Into<Selector>,
        mark: MarkRef,
    ) -> Result<EdgeId> {
        let from = self.add_operator(Arc::clone(source));
        let to = self.add_operator(Arc::clone(target));

        let getter = self.vertices[from.index()]
            .products
            .getter(&product.into())?;
        let setter = self.vertices[to.index()]
            .requisites
            .setter(&requisite.into())?;

        if let Some(existing) = &self.vertices[from.index()].declared[getter.position()] {
            if existing.id() != mark.id() {
                return Err(KilnError::SlotAlreadyBound {
                    vertex: from,
                    position: getter.position(),
                    existing: existing.id(),
                });
            }
        }

        if let Some(edge_id) = self.vertices[to.index()].bound[setter.position()] {
            let edge = &self.edges[edge_id.index()];
            if edge.source == from && edge.getter == getter && edge.mark.id() == mark.id() {
                return Ok(edge_id);
            }
            return Err(KilnError::SlotAlreadyBound {
                vertex: to,
                position: setter.position(),
                existing: edge.mark.id(),
            });
        }

        let edge_id = EdgeId::new(self.edges.len() as u32);
        self.vertices[from.index()].declared[getter.position()] = Some(Arc::clone(&mark));
        self.vertices[from.index()].outgoing.push(edge_id);
        self.vertices[to.index()].bound[setter.position()] = Some(edge_id);
        self.vertices[to.index()].incoming.push(edge_id);

        tracing::trace!(
            edge = %edge_id,
            source = %from,
            target = %to,
            mark = %mark.id(),
            "Edge added"
        );

        self.edges.push(Edge {
            mark,
            source: from,
            target: to,
            getter,
            setter,
        });
        Ok(edge_id)
    }

    /// Find every cycle in the graph.
    pub fn cycles(&self) -> CycleReport {
        let successors: Vec<Vec<VertexId>> = self
            .vertices
            .iter()
            .map(|vertex| {
                vertex
                    .outgoing
                    .iter()
                    .map(|edge| self.edges[edge.index()].target)
                    .collect()
            })
            .collect();
        cycles::find_cycles(&successors)
    }

    /// Check that the graph is acyclic.
    ///
    /// Cycles are reported through `tracing` and the graph's log context;
    /// use [`cycles`](Self::cycles) for the structured report.
    pub fn verify(&self) -> bool {
        let report = self.cycles();
        self.report_cycles(&report, &self.log);
        report.is_empty()
    }

    fn report_cycles(&self, report: &CycleReport, log: &LogContext) {
        if report.is_empty() {
            tracing::debug!(
                vertices = self.vertices.len(),
                edges = self.edges.len(),
                "Graph is acyclic"
            );
            return;
        }

        for cycle in report.cycles() {
            let walk = cycle
                .vertices()
                .iter()
                .map(|vertex| self.vertices[vertex.index()].info.name.as_str())
                .collect::<Vec<_>>()
                .join(" -> ");
            tracing::warn!(length = cycle.len(), cycle = %cycle, operators = %walk, "Cycle detected");
            log.log(
                LogEvent::warn(LogCategory::Graph, "Cycle detected")
                    .with_field("cycle", cycle.to_string())
                    .with_field("operators", walk)
                    .with_field_u64("length", cycle.len() as u64),
            );
        }
    }

    /// Compile the graph into a fresh schedule on `context`.
    ///
    /// Every call allocates new storage, so schedules never share slot
    /// contents. Product slots start out holding their declared marks.
    ///
    /// # Errors
    ///
    /// Refuses with [`KilnError::CyclicGraph`] while the graph has cycles.
    #[instrument(skip(self, context), fields(vertices = self.vertices.len(), edges = self.edges.len()))]
    pub fn compile(&self, context: &Context) -> Result<Schedule> {
        let report = self.cycles();
        if !report.is_empty() {
            self.report_cycles(&report, &context.dispatcher().log());
            return Err(KilnError::CyclicGraph {
                cycles: report.len(),
            });
        }

        let schedule_id = ScheduleId::new();
        let mut items = Vec::with_capacity(self.vertices.len());
        let mut roots = Vec::new();

        for (index, vertex) in self.vertices.iter().enumerate() {
            let mut products = vertex.products.allocate();
            for (position, mark) in vertex.declared.iter().enumerate() {
                if let Some(mark) = mark {
                    products.put(position, Arc::clone(mark))?;
                }
            }

            let links = vertex
                .outgoing
                .iter()
                .map(|edge_id| {
                    let edge = &self.edges[edge_id.index()];
                    Link {
                        getter: edge.getter,
                        setter: edge.setter,
                        target: edge.target.index(),
                    }
                })
                .collect::<Vec<_>>();

            if vertex.incoming.is_empty() {
                roots.push(index);
            }

            items.push(Item::new(
                VertexId::new(index as u32),
                Arc::clone(&vertex.operator),
                vertex.info.name.clone(),
                vertex.incoming.len(),
                vertex.requisites.allocate(),
                products,
                links,
            ));
        }

        tracing::info!(
            schedule_id = %schedule_id,
            items = items.len(),
            roots = roots.len(),
            "Graph compiled"
        );
        context.dispatcher().log().log(
            LogEvent::info(LogCategory::Graph, "Graph compiled")
                .with_schedule_id(schedule_id)
                .with_field_u64("items", items.len() as u64)
                .with_field_u64("roots", roots.len() as u64),
        );

        Ok(Schedule::new(
            schedule_id,
            items,
            roots,
            Arc::clone(context.dispatcher()),
        ))
    }

    /// Number of vertices.
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    /// Number of edges.
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Number of edges into `vertex`.
    pub fn in_degree(&self, vertex: VertexId) -> Result<usize> {
        self.vertex(vertex).map(|v| v.incoming.len())
    }

    /// Number of edges out of `vertex`.
    pub fn out_degree(&self, vertex: VertexId) -> Result<usize> {
        self.vertex(vertex).map(|v| v.outgoing.len())
    }

    /// Vertex registered for an operator identity.
    pub fn vertex_of(&self, operator: EntityId) -> Option<VertexId> {
        self.index.get(&operator).copied()
    }

    /// A registered vertex.
    pub fn vertex(&self, vertex: VertexId) -> Result<&Vertex> {
        self.vertices
            .get(vertex.index())
            .ok_or(KilnError::UnknownVertex { vertex })
    }

    /// The operator of a vertex.
    pub fn operator(&self, vertex: VertexId) -> Result<&Arc<dyn Operator>> {
        self.vertex(vertex).map(Vertex::operator)
    }

    /// All edges, indexed by [`EdgeId`].
    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// Edges out of `vertex`.
    pub fn outgoing_edges(&self, vertex: VertexId) -> impl Iterator<Item = &Edge> {
        self.vertices
            .get(vertex.index())
            .into_iter()
            .flat_map(|v| v.outgoing.iter().map(|id| &self.edges[id.index()]))
    }

    /// Edges into `vertex`.
    pub fn incoming_edges(&self, vertex: VertexId) -> impl Iterator<Item = &Edge> {
        self.vertices
            .get(vertex.index())
            .into_iter()
            .flat_map(|v| v.incoming.iter().map(|id| &self.edges[id.index()]))
    }
}

impl Default for Graph {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Graph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Graph")
            .field("vertices", &self.vertices)
            .field("edges", &self.edges.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiln_core::logging::{BufferedCollector, LogCollector};
    use kiln_core::mark::Stamp;
    use kiln_core::pack::Storage;
    use kiln_core::traits::{Action, Outcome};

    struct Rule {
        id: EntityId,
        name: &'static str,
        requisites: usize,
        products: usize,
    }

    impl Operator for Rule {
        fn id(&self) -> EntityId {
            self.id
        }

        fn info(&self) -> OperatorInfo {
            OperatorInfo::new("test", self.name)
        }

        fn requisite_schema(&self) -> Schema {
            slots(self.requisites, "in")
        }

        fn product_schema(&self) -> Schema {
            slots(self.products, "out")
        }

        fn apply(&self, _: &Action<'_>, _: &Storage, _: &mut Storage) -> Outcome {
            Outcome::Skipped
        }
    }

    /// `count` slots, the first aliased `first`.
    fn slots(count: usize, first: &str) -> Schema {
        if count == 0 {
            return Schema::empty();
        }
        Schema::declare(count, [(first, 0)]).unwrap()
    }

    fn rule(name: &'static str, requisites: usize, products: usize) -> Arc<dyn Operator> {
        Arc::new(Rule {
            id: EntityId::new(),
            name,
            requisites,
            products,
        })
    }

    #[test]
    fn vertices_are_deduplicated_by_identity() {
        let mut graph = Graph::new();
        let a = rule("a", 0, 1);
        let first = graph.add_operator(Arc::clone(&a));
        let second = graph.add_operator(Arc::clone(&a));
        assert_eq!(first, second);
        assert_eq!(graph.vertex_count(), 1);
        assert_eq!(graph.vertex_of(a.id()), Some(first));
    }

    #[test]
    fn add_edge_binds_slots() {
        let mut graph = Graph::new();
        let a = rule("a", 0, 2);
        let b = rule("b", 2, 0);
        let mark = Stamp::new("m").into_ref();

        let edge = graph.add_edge(&a, "out", &b, 1usize, mark).unwrap();
        let edge = &graph.edges()[edge.index()];
        assert_eq!(edge.getter.position(), 0);
        assert_eq!(edge.setter.position(), 1);
        assert_eq!(graph.out_degree(edge.source).unwrap(), 1);
        assert_eq!(graph.in_degree(edge.target).unwrap(), 1);
    }

    #[test]
    fn identical_edge_is_idempotent() {
        let mut graph = Graph::new();
        let a = rule("a", 0, 1);
        let b = rule("b", 1, 0);
        let mark = Stamp::new("m").into_ref();

        let first = graph.add_edge(&a, "out", &b, "in", Arc::clone(&mark)).unwrap();
        let second = graph.add_edge(&a, 0usize, &b, 0usize, mark).unwrap();
        assert_eq!(first, second);
        assert_eq!(graph.edge_count(), 1);
    }

    #[test]
    fn conflicting_bindings_are_rejected() {
        let mut graph = Graph::new();
        let a = rule("a", 0, 1);
        let b = rule("b", 1, 0);
        let c = rule("c", 0, 1);

        graph
            .add_edge(&a, "out", &b, "in", Stamp::new("m").into_ref())
            .unwrap();

        // Another producer for the same requisite slot.
        let err = graph
            .add_edge(&c, "out", &b, "in", Stamp::new("n").into_ref())
            .unwrap_err();
        assert!(matches!(err, KilnError::SlotAlreadyBound { .. }));

        // A different mark on an already declared product slot.
        let d = rule("d", 1, 0);
        let err = graph
            .add_edge(&a, "out", &d, "in", Stamp::new("o").into_ref())
            .unwrap_err();
        assert!(matches!(err, KilnError::SlotAlreadyBound { position: 0, .. }));
    }

    #[test]
    fn fan_out_of_one_mark_is_allowed() {
        let mut graph = Graph::new();
        let a = rule("a", 0, 1);
        let b = rule("b", 1, 0);
        let c = rule("c", 1, 0);
        let mark = Stamp::new("shared").into_ref();

        graph.add_edge(&a, "out", &b, "in", Arc::clone(&mark)).unwrap();
        graph.add_edge(&a, "out", &c, "in", mark).unwrap();
        assert_eq!(graph.edge_count(), 2);
        assert_eq!(graph.out_degree(VertexId::new(0)).unwrap(), 2);
    }

    #[test]
    fn unresolved_selectors_fail_at_bind_time() {
        let mut graph = Graph::new();
        let a = rule("a", 0, 1);
        let b = rule("b", 1, 0);

        let err = graph
            .add_edge(&a, "missing", &b, "in", Stamp::new("m").into_ref())
            .unwrap_err();
        assert!(matches!(err, KilnError::UnknownSlotName { .. }));

        let err = graph
            .add_edge(&a, "out", &b, 3usize, Stamp::new("m").into_ref())
            .unwrap_err();
        assert!(matches!(err, KilnError::SlotOutOfRange { position: 3, len: 1 }));
        assert_eq!(graph.edge_count(), 0);
    }

    #[test]
    fn verify_reports_cycles_to_log() {
        let collector = Arc::new(BufferedCollector::new(16));
        let mut graph = Graph::with_log(LogContext::new(collector.clone()));
        let a = rule("a", 1, 1);
        let b = rule("b", 1, 1);

        graph.add_edge(&a, "out", &b, "in", Stamp::new("ab").into_ref()).unwrap();
        assert!(graph.verify());
        assert!(collector.is_empty());

        graph.add_edge(&b, "out", &a, "in", Stamp::new("ba").into_ref()).unwrap();
        assert!(!graph.verify());

        let events = collector.by_category(LogCategory::Graph);
        assert_eq!(events.len(), 1);
        assert!(events[0].fields["operators"].as_str().unwrap().contains("test::a"));
    }

    #[test]
    fn unknown_vertex_lookup_fails() {
        let graph = Graph::new();
        assert!(matches!(
            graph.in_degree(VertexId::new(9)),
            Err(KilnError::UnknownVertex { .. })
        ));
        assert_eq!(graph.outgoing_edges(VertexId::new(9)).count(), 0);
    }
}
