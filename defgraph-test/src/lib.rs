// Integration test utilities and fixture management for defgraph.

use std::path::Path;

use defgraph_core::config::DefGraphConfig;
use defgraph_core::graph::loader::GraphArtifacts;
use defgraph_core::pipeline::BuildPipeline;
use defgraph_core::store::sqlite::SqliteStore;
use defgraph_core::types::BuildStats;

/// A test fixture with a temporary mod directory.
#[derive(Debug)]
pub struct TestMod {
    pub dir: tempfile::TempDir,
}

impl TestMod {
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// An empty mod directory.
    pub fn empty() -> Self {
        Self {
            dir: tempfile::tempdir().expect("create tempdir"),
        }
    }

    /// A small but realistic mod: a comp class hierarchy, a building class,
    /// and Defs that bind them, reference each other, and inherit.
    pub fn minimal_mod() -> Self {
        let fixture = Self::empty();
        let root = fixture.path();

        std::fs::create_dir_all(root.join("Source")).unwrap();
        std::fs::create_dir_all(root.join("Defs")).unwrap();

        std::fs::write(
            root.join("Source/Core.cs"),
            r"namespace Verse {
    public interface IExposable {
        void ExposeData();
    }
    public class Def {
        public string defName;
    }
    public class Thing {
        public void Destroy() {}
    }
    public class ThingComp {
        public virtual void CompTick() {}
    }
}
",
        )
        .unwrap();

        std::fs::write(
            root.join("Source/Explosive.cs"),
            r"namespace RimWorld {
    public class CompExplosive : Verse.ThingComp, Verse.IExposable {
        public float radius;
        public void ExposeData() {}
        public void Detonate(Verse.Thing instigator) {
            instigator.Destroy();
        }
        public override void CompTick() {
            Detonate(null);
        }
    }
    public class Building_Turret : Verse.Thing {
    }
}
",
        )
        .unwrap();

        std::fs::write(
            root.join("Defs/Things.xml"),
            r#"<Defs>
  <ThingDef Name="BuildingBase" Abstract="True">
    <category>Building</category>
  </ThingDef>
  <ThingDef ParentName="BuildingBase">
    <defName>Turret</defName>
    <thingClass>Building_Turret</thingClass>
    <costList><Steel>25</Steel></costList>
    <comps>
      <li Class="RimWorld.CompExplosive">
        <radius>2.9</radius>
      </li>
    </comps>
  </ThingDef>
  <ThingDef>
    <defName>Steel</defName>
  </ThingDef>
</Defs>
"#,
        )
        .unwrap();

        std::fs::write(
            root.join("Defs/Recipes.xml"),
            r"<Defs>
  <RecipeDef>
    <defName>SmeltSteel</defName>
    <products><Steel>15</Steel></products>
    <ingredients>
      <li>
        <filter><thingDefs><li>Turret</li></thingDefs></filter>
      </li>
    </ingredients>
  </RecipeDef>
</Defs>
",
        )
        .unwrap();

        fixture
    }
}

/// Run the full pipeline over a mod directory; returns the stats, the
/// store, the loaded graph, and the index dir keeping the artefacts alive.
pub async fn run_pipeline(
    root: &Path,
) -> (BuildStats, SqliteStore, GraphArtifacts, tempfile::TempDir) {
    let index = tempfile::tempdir().expect("create index dir");
    let store = SqliteStore::in_memory().expect("open store");
    let config = DefGraphConfig::default();

    let pipeline = BuildPipeline::new(root, index.path());
    let stats = pipeline
        .run(&store, &config)
        .await
        .expect("pipeline should succeed");

    let graph = GraphArtifacts::load(&pipeline.artifact_paths(&config)).expect("load artefacts");
    (stats, store, graph, index)
}
