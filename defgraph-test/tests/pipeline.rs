use defgraph_core::query;
use defgraph_core::store::ChunkStore;
use defgraph_core::types::{Direction, SymbolFilter};
use defgraph_extract::EdgeKind;
use defgraph_test::{TestMod, run_pipeline};

// ── Minimal mod fixture ──────────────────────────────────────────

#[tokio::test]
async fn minimal_mod_full_pipeline() {
    let fixture = TestMod::minimal_mod();
    let (stats, store, graph, _index) = run_pipeline(fixture.path()).await;

    // Types, methods, and four Defs all become chunks.
    assert!(stats.chunks >= 10, "got {} chunks", stats.chunks);
    assert!(stats.code_edges >= 4, "got {} code edges", stats.code_edges);
    assert_eq!(stats.xml_code_edges, 2, "thingClass binding + comps li");
    assert_eq!(stats.reverse_edges, 2);
    assert!(stats.xml_def_edges >= 3, "parent + costList + recipe refs");
    assert_eq!(stats.nodes, graph.node_count());
    assert_eq!(stats.edges, graph.edge_count());

    // The turret Def binds its building class…
    let used_by = query::query(
        &graph,
        "RimWorld.Building_Turret",
        Direction::UsedBy,
        Some(SymbolFilter::Xml),
        1,
        10,
    );
    assert!(
        used_by.results.iter().any(|h| h.symbol_id == "xml:ThingDef:Turret"),
        "got {used_by:?}"
    );

    // …and uses both bound classes on the code side.
    let uses_code = query::query(
        &graph,
        "xml:ThingDef:Turret",
        Direction::Uses,
        Some(SymbolFilter::Code),
        1,
        10,
    );
    let code_targets: Vec<&str> = uses_code.results.iter().map(|h| h.symbol_id.as_str()).collect();
    assert!(code_targets.contains(&"RimWorld.Building_Turret"), "got {code_targets:?}");
    assert!(code_targets.contains(&"RimWorld.CompExplosive"), "got {code_targets:?}");

    // On the Def side: ParentName inheritance and the costList reference.
    let uses_xml = query::query(
        &graph,
        "xml:ThingDef:Turret",
        Direction::Uses,
        Some(SymbolFilter::Xml),
        1,
        10,
    );
    let xml_targets: Vec<&str> = uses_xml.results.iter().map(|h| h.symbol_id.as_str()).collect();
    assert!(xml_targets.contains(&"xml:BuildingBase"), "got {xml_targets:?}");
    assert!(xml_targets.contains(&"xml:Steel"), "got {xml_targets:?}");

    // Class hierarchy flows through phase 1.
    let thing_used_by = query::query(
        &graph,
        "Verse.ThingComp",
        Direction::UsedBy,
        Some(SymbolFilter::Code),
        1,
        10,
    );
    assert!(
        thing_used_by.results.iter().any(|h| h.symbol_id == "RimWorld.CompExplosive"),
        "got {thing_used_by:?}"
    );

    // The chunk store serves the source behind a resolved symbol.
    let chunk = store
        .get_chunk("RimWorld.CompExplosive")
        .await
        .unwrap()
        .expect("comp chunk stored");
    assert!(chunk.text.contains("Detonate"));
}

#[tokio::test]
async fn reverse_edges_pair_one_to_one() {
    let fixture = TestMod::minimal_mod();
    let (_stats, _store, graph, _index) = run_pipeline(fixture.path()).await;

    let mut binds = 0usize;
    let mut reversed = 0usize;
    for node in 0..graph.node_count() {
        for (_, kind) in graph.out_neighbors(node) {
            match EdgeKind::from_byte(kind) {
                Some(EdgeKind::XmlBindsClass | EdgeKind::XmlUsesComp) => binds += 1,
                Some(EdgeKind::CodeUsedByDef) => reversed += 1,
                _ => {}
            }
        }
    }
    assert!(binds > 0);
    assert_eq!(binds, reversed, "kind-30 count must equal kind-20 + kind-21");
}

#[tokio::test]
async fn no_self_loops_and_full_node_coverage() {
    let fixture = TestMod::minimal_mod();
    let (_stats, _store, graph, _index) = run_pipeline(fixture.path()).await;

    for node in 0..graph.node_count() {
        for (counterpart, _) in graph.out_neighbors(node) {
            assert_ne!(node, counterpart, "self loop at {:?}", graph.symbol_of(node));
            assert!(graph.symbol_of(counterpart).is_some(), "dangling node index");
        }
    }

    // A node-index reference resolves like its symbol.
    let first = graph.symbol_of(0).unwrap().to_string();
    let by_index = query::query(&graph, "#0", Direction::Uses, None, 1, 10);
    let by_symbol = query::query(&graph, &first, Direction::Uses, None, 1, 10);
    assert_eq!(by_index.total_count, by_symbol.total_count);
}

#[tokio::test]
async fn pagerank_is_a_distribution() {
    let fixture = TestMod::minimal_mod();
    let (_stats, _store, graph, _index) = run_pipeline(fixture.path()).await;

    let sum: f64 = graph
        .symbols()
        .iter()
        .map(|symbol| graph.score(symbol))
        .sum();
    assert!((sum - 1.0).abs() < 1e-3, "pagerank sum = {sum}");
    assert!(graph.symbols().iter().all(|s| graph.score(s) >= 0.0));
}

#[tokio::test]
async fn rebuild_is_byte_identical() {
    let fixture = TestMod::minimal_mod();

    let index_a = tempfile::tempdir().unwrap();
    let index_b = tempfile::tempdir().unwrap();
    let config = defgraph_core::config::DefGraphConfig::default();

    for index in [&index_a, &index_b] {
        let store = defgraph_core::store::sqlite::SqliteStore::in_memory().unwrap();
        defgraph_core::pipeline::BuildPipeline::new(fixture.path(), index.path())
            .run(&store, &config)
            .await
            .unwrap();
    }

    for name in ["graph.nodes.tsv", "graph.csr.bin", "graph.csc.bin", "graph.pagerank.tsv"] {
        let a = std::fs::read(index_a.path().join(name)).unwrap();
        let b = std::fs::read(index_b.path().join(name)).unwrap();
        assert_eq!(a, b, "{name} differs between identical builds");
    }
}

// ── Empty corpus ─────────────────────────────────────────────────

#[tokio::test]
async fn empty_corpus_yields_valid_empty_artifacts() {
    let fixture = TestMod::empty();
    let (stats, store, graph, index) = run_pipeline(fixture.path()).await;

    assert_eq!(stats.chunks, 0);
    assert_eq!(graph.node_count(), 0);
    assert_eq!(graph.edge_count(), 0);
    assert_eq!(store.count_chunks().await.unwrap(), 0);

    // Valid magic on the binary artefacts, zero-line PageRank table.
    let csr = std::fs::read(index.path().join("graph.csr.bin")).unwrap();
    assert_eq!(&csr[0..4], b"CSR1");
    let pagerank = std::fs::read_to_string(index.path().join("graph.pagerank.tsv")).unwrap();
    assert!(pagerank.is_empty());

    for direction in [Direction::Uses, Direction::UsedBy] {
        let page = query::query(&graph, "anything", direction, None, 1, 10);
        assert_eq!(page.total_count, 0);
        assert!(page.results.is_empty());
    }
}

// ── Fuzzy entry points over a real build ─────────────────────────

#[tokio::test]
async fn fuzzy_and_prefix_references_resolve() {
    let fixture = TestMod::minimal_mod();
    let (_stats, _store, graph, _index) = run_pipeline(fixture.path()).await;

    // Multi-part fuzzy reference.
    assert_eq!(
        query::resolve_reference(&graph, "comp explosive").as_deref(),
        Some("RimWorld.CompExplosive")
    );
    // xml: prefix scan.
    let resolved = query::resolve_reference(&graph, "xml:ThingDef:Tur").unwrap();
    assert_eq!(resolved, "xml:ThingDef:Turret");
    // Unresolvable reference stays unresolved.
    assert_eq!(query::resolve_reference(&graph, "zz qq ww"), None);
}
