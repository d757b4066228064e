//! End-to-end def-map builds against an in-memory host
//!
//! Each test assembles a small virtual crate (files, directories, macro
//! expansions), runs the full build, and asserts on the resulting map.

use std::collections::HashMap;
use std::sync::Arc;

use opal_hir::{CrateId, DirId, FileId, ImportPath, Item, ItemTree, UseDecl};
use opal_resolve::{
    BuildToken, CrateData, CrateDefMap, Dependency, Edition, MacroCallInfo, MacroDefInfo,
    MacroExpander, MacroExpansion, ModData, ModPath, PerNs, ResolveMode, RootAttrs,
    SourceProvider, VisItem, Visibility, build_crate_def_map,
};

#[derive(Clone, Copy)]
enum Entry {
    File(FileId),
    Dir(DirId),
}

/// In-memory file tree plus a table-driven macro expander.
#[derive(Default)]
struct TestHost {
    trees: HashMap<FileId, ItemTree>,
    dir_entries: HashMap<DirId, HashMap<String, Entry>>,
    dir_paths: HashMap<DirId, String>,
    expansions: HashMap<String, Vec<Item>>,
}

impl SourceProvider for TestHost {
    fn item_tree(&self, file: FileId) -> Option<&ItemTree> {
        self.trees.get(&file)
    }

    fn resolve_relative(&self, dir: DirId, path: &str) -> Option<FileId> {
        let mut dir = dir;
        let mut parts = path.split('/').peekable();
        while let Some(part) = parts.next() {
            match (self.dir_entries.get(&dir)?.get(part)?, parts.peek()) {
                (Entry::File(file), None) => return Some(*file),
                (Entry::Dir(next), Some(_)) => dir = *next,
                _ => return None,
            }
        }
        None
    }

    fn subdirectory(&self, dir: DirId, name: &str) -> Option<DirId> {
        match self.dir_entries.get(&dir)?.get(name)? {
            Entry::Dir(dir) => Some(*dir),
            Entry::File(_) => None,
        }
    }

    fn display_path(&self, dir: DirId, path: &str) -> String {
        match self.dir_paths.get(&dir) {
            Some(prefix) => format!("{}/{}", prefix, path),
            None => path.to_string(),
        }
    }
}

impl MacroExpander for TestHost {
    fn expand(&self, def: &MacroDefInfo, _call: &MacroCallInfo) -> Option<MacroExpansion> {
        self.expansions.get(&def.name).map(|items| MacroExpansion {
            items: ItemTree::new(items.clone()),
            dollar_crate: Some(def.krate),
        })
    }
}

struct Fixture {
    host: TestHost,
    root_dir: DirId,
    next_file: u32,
    next_dir: u32,
}

impl Fixture {
    fn new() -> Self {
        let mut host = TestHost::default();
        let root_dir = DirId::new(0);
        host.dir_entries.insert(root_dir, HashMap::new());
        host.dir_paths.insert(root_dir, "/src".to_string());
        Self {
            host,
            root_dir,
            next_file: 0,
            next_dir: 1,
        }
    }

    fn add_file(&mut self, dir: DirId, name: &str, items: Vec<Item>) -> FileId {
        let file = FileId::new(self.next_file);
        self.next_file += 1;
        self.host.trees.insert(file, ItemTree::new(items));
        self.host
            .dir_entries
            .get_mut(&dir)
            .expect("unknown directory")
            .insert(name.to_string(), Entry::File(file));
        file
    }

    fn add_dir(&mut self, parent: DirId, name: &str) -> DirId {
        let dir = DirId::new(self.next_dir);
        self.next_dir += 1;
        let path = format!("{}/{}", self.host.dir_paths[&parent], name);
        self.host.dir_entries.insert(dir, HashMap::new());
        self.host.dir_paths.insert(dir, path);
        self.host
            .dir_entries
            .get_mut(&parent)
            .expect("unknown directory")
            .insert(name.to_string(), Entry::Dir(dir));
        dir
    }

    fn add_expansion(&mut self, name: &str, items: Vec<Item>) {
        self.host.expansions.insert(name.to_string(), items);
    }

    fn build(&self, crate_data: &CrateData) -> CrateDefMap {
        self.build_with_deps(crate_data, HashMap::new())
    }

    fn build_with_deps(
        &self,
        crate_data: &CrateData,
        deps: HashMap<CrateId, Arc<CrateDefMap>>,
    ) -> CrateDefMap {
        let token = BuildToken::new();
        let map = build_crate_def_map(crate_data, deps, &self.host, &self.host, &token)
            .expect("build failed")
            .expect("crate not indexable");
        map.verify().expect("invariants violated");
        map
    }
}

fn local_crate() -> CrateId {
    CrateId::new(0)
}

/// A dependency map with public items at the root and optionally a
/// prelude module.
fn dependency_map(krate: CrateId, root_items: &[&str], prelude_items: &[&str]) -> Arc<CrateDefMap> {
    let file = FileId::new(90 + krate.as_u32());
    let root = ModData::new(krate, ModPath::root(krate), file);
    let mut map = CrateDefMap::new(krate, Edition::Edition2021, root);
    let root_id = map.root();
    for name in root_items {
        map.module_mut(root_id).add_visible_item(
            *name,
            PerNs::types(VisItem::new(
                ModPath::new(krate, [*name]),
                Visibility::Public,
            )),
        );
    }
    if !prelude_items.is_empty() {
        let prelude_path = ModPath::new(krate, ["prelude"]);
        let mut prelude =
            ModData::new(krate, prelude_path.clone(), file).with_parent(root_id);
        for name in prelude_items {
            prelude.add_visible_item(
                *name,
                PerNs::types(VisItem::new(prelude_path.child(*name), Visibility::Public)),
            );
        }
        let prelude_id = map.alloc_module(prelude);
        map.module_mut(root_id).add_child_module("prelude", prelude_id);
        map.module_mut(root_id).add_visible_item(
            "prelude",
            PerNs::types(VisItem::module(prelude_path, Visibility::Public)),
        );
        map.prelude = Some(map.module_ref(prelude_id));
    }
    Arc::new(map)
}

#[test]
fn basic_reexport() {
    let mut fx = Fixture::new();
    fx.add_file(fx.root_dir, "a.rs", vec![Item::struct_("X").public()]);
    let lib = fx.add_file(
        fx.root_dir,
        "lib.rs",
        vec![
            Item::mod_outline("a"),
            Item::use_(UseDecl::named(ImportPath::plain(["a", "X"]))).public(),
        ],
    );

    let map = fx.build(&CrateData::new(local_crate(), lib, fx.root_dir));

    let binding = map.root_module().get_visible_item("X").expect("X missing");
    let types = binding.types.as_ref().expect("X has no type binding");
    assert_eq!(types.path, ModPath::new(local_crate(), ["a", "X"]));
    assert_eq!(types.visibility, Visibility::Public);
    assert!(map.missed_files.is_empty());
}

#[test]
fn named_import_wins_over_glob() {
    let mut fx = Fixture::new();
    fx.add_file(
        fx.root_dir,
        "m.rs",
        vec![Item::struct_("T").public(), Item::struct_("U").public()],
    );
    let lib = fx.add_file(
        fx.root_dir,
        "lib.rs",
        vec![
            Item::mod_outline("m"),
            Item::use_(UseDecl::glob(ImportPath::plain(["m"]))).public(),
            Item::use_(UseDecl::named(ImportPath::plain(["m", "T"]))),
        ],
    );

    let map = fx.build(&CrateData::new(local_crate(), lib, fx.root_dir));
    let root = map.root_module();

    // The private named import shadows the public glob binding for `T`;
    // `U` keeps the glob's visibility.
    let t = root.get_visible_item("T").unwrap().types.as_ref().unwrap();
    assert_eq!(
        t.visibility,
        Visibility::Restricted(ModPath::root(local_crate()))
    );
    let u = root.get_visible_item("U").unwrap().types.as_ref().unwrap();
    assert_eq!(u.visibility, Visibility::Public);
}

#[test]
fn chained_glob_reexport() {
    let mut fx = Fixture::new();
    fx.add_file(fx.root_dir, "b.rs", vec![Item::struct_("Z").public()]);
    fx.add_file(
        fx.root_dir,
        "a.rs",
        vec![Item::use_(UseDecl::glob(ImportPath::super_(1, ["b"]))).public()],
    );
    let lib = fx.add_file(
        fx.root_dir,
        "lib.rs",
        vec![
            Item::mod_outline("a"),
            Item::mod_outline("b"),
            Item::use_(UseDecl::glob(ImportPath::plain(["a"]))),
        ],
    );

    let map = fx.build(&CrateData::new(local_crate(), lib, fx.root_dir));
    let z = map.root_module().get_visible_item("Z");
    assert!(z.is_some(), "Z should flow lib <- a <- b");
    assert_eq!(
        z.unwrap().types.as_ref().unwrap().path,
        ModPath::new(local_crate(), ["b", "Z"])
    );
}

#[test]
fn removing_middle_glob_breaks_the_chain() {
    let mut fx = Fixture::new();
    fx.add_file(fx.root_dir, "b.rs", vec![Item::struct_("Z").public()]);
    // Same shape as `chained_glob_reexport`, minus the re-export in `a`.
    fx.add_file(fx.root_dir, "a.rs", vec![]);
    let lib = fx.add_file(
        fx.root_dir,
        "lib.rs",
        vec![
            Item::mod_outline("a"),
            Item::mod_outline("b"),
            Item::use_(UseDecl::glob(ImportPath::plain(["a"]))),
        ],
    );

    let map = fx.build(&CrateData::new(local_crate(), lib, fx.root_dir));
    assert!(map.root_module().get_visible_item("Z").is_none());
}

#[test]
fn macro_defined_item_becomes_visible() {
    let mut fx = Fixture::new();
    fx.add_expansion("m", vec![Item::struct_("Q").public()]);
    let lib = fx.add_file(
        fx.root_dir,
        "lib.rs",
        vec![
            Item::macro_rules("m", "pub struct Q;"),
            Item::macro_call(ImportPath::plain(["m"]), ""),
        ],
    );

    let map = fx.build(&CrateData::new(local_crate(), lib, fx.root_dir));
    let q = map.root_module().get_visible_item("Q").expect("Q missing");
    assert!(q.types.is_some());
}

#[test]
fn macro_item_reaches_glob_importer() {
    let mut fx = Fixture::new();
    fx.add_expansion("m", vec![Item::struct_("Q").public()]);
    fx.add_file(
        fx.root_dir,
        "user.rs",
        vec![Item::use_(UseDecl::glob(ImportPath::super_(1, Vec::<String>::new())))],
    );
    let lib = fx.add_file(
        fx.root_dir,
        "lib.rs",
        vec![
            Item::mod_outline("user"),
            Item::macro_rules("m", "pub struct Q;"),
            Item::macro_call(ImportPath::plain(["m"]), ""),
        ],
    );

    let map = fx.build(&CrateData::new(local_crate(), lib, fx.root_dir));
    let user = *map.root_module().child_modules.get("user").unwrap();
    assert!(
        map.module(user).get_visible_item("Q").is_some(),
        "macro-introduced item should propagate through the glob"
    );
}

#[test]
fn missing_include_is_recorded() {
    let mut fx = Fixture::new();
    let lib = fx.add_file(
        fx.root_dir,
        "lib.rs",
        vec![Item::macro_call(
            ImportPath::plain(["include"]),
            "\"nope.rs\"",
        )],
    );

    let map = fx.build(&CrateData::new(local_crate(), lib, fx.root_dir));
    assert_eq!(map.missed_files, vec!["/src/nope.rs".to_string()]);
}

#[test]
fn include_splices_items_into_caller() {
    let mut fx = Fixture::new();
    let r#gen = fx.add_file(fx.root_dir, "gen.rs", vec![Item::struct_("G").public()]);
    let lib = fx.add_file(
        fx.root_dir,
        "lib.rs",
        vec![Item::macro_call(
            ImportPath::plain(["include"]),
            "\"gen.rs\"",
        )],
    );

    let map = fx.build(&CrateData::new(local_crate(), lib, fx.root_dir));
    assert!(map.root_module().get_visible_item("G").is_some());
    assert!(map.file_infos.contains_key(&r#gen));
    assert!(map.missed_files.is_empty());
}

#[test]
fn no_std_prunes_extern_prelude() {
    let std_id = CrateId::new(1);
    let core_id = CrateId::new(2);
    let mut deps = HashMap::new();
    deps.insert(std_id, dependency_map(std_id, &[], &[]));
    deps.insert(core_id, dependency_map(core_id, &[], &[]));

    let mut fx = Fixture::new();
    let lib = fx.add_file(fx.root_dir, "lib.rs", vec![]);
    let data = CrateData::new(local_crate(), lib, fx.root_dir)
        .with_edition(Edition::Edition2015)
        .with_attrs(RootAttrs::NoStd)
        .with_dependency(Dependency::new("std", std_id))
        .with_dependency(Dependency::new("core", core_id));

    let map = fx.build_with_deps(&data, deps);

    assert!(!map.extern_prelude.contains_key("std"));
    assert!(map.extern_prelude.contains_key("core"));
    // Edition 2015: the implicit `extern crate core;` binds a name in
    // the root module.
    let core_binding = map
        .root_module()
        .get_visible_item("core")
        .expect("implicit extern crate core not injected");
    assert!(core_binding.types.as_ref().unwrap().is_mod_or_enum);
}

#[test]
fn later_prelude_overwrites_earlier() {
    let core_id = CrateId::new(1);
    let std_id = CrateId::new(2);
    let mut deps = HashMap::new();
    deps.insert(core_id, dependency_map(core_id, &[], &["Clone"]));
    deps.insert(std_id, dependency_map(std_id, &[], &["Clone", "String"]));

    let mut fx = Fixture::new();
    let lib = fx.add_file(fx.root_dir, "lib.rs", vec![]);
    let data = CrateData::new(local_crate(), lib, fx.root_dir)
        .with_dependency(Dependency::new("core", core_id))
        .with_dependency(Dependency::new("std", std_id));

    let map = fx.build_with_deps(&data, deps);

    let prelude = map.prelude.expect("no prelude selected");
    assert_eq!(prelude.krate, std_id);

    // Names resolve through the prelude as the outermost scope.
    let result = map.resolve_path_fp(
        map.root(),
        &ImportPath::plain(["String"]),
        ResolveMode::Import,
        false,
    );
    assert!(result.per_ns.types.is_some());
    assert!(result.visited_other_crate);
}

#[test]
fn cross_crate_import_respects_visibility() {
    let util = CrateId::new(3);
    let mut deps = HashMap::new();
    let util_map = {
        let file = FileId::new(99);
        let root = ModData::new(util, ModPath::root(util), file);
        let mut map = CrateDefMap::new(util, Edition::Edition2021, root);
        let root_id = map.root();
        map.module_mut(root_id).add_visible_item(
            "Helper",
            PerNs::types(VisItem::new(
                ModPath::new(util, ["Helper"]),
                Visibility::Public,
            )),
        );
        map.module_mut(root_id).add_visible_item(
            "Secret",
            PerNs::types(VisItem::new(
                ModPath::new(util, ["Secret"]),
                Visibility::Restricted(ModPath::root(util)),
            )),
        );
        Arc::new(map)
    };
    deps.insert(util, util_map);

    let mut fx = Fixture::new();
    let lib = fx.add_file(
        fx.root_dir,
        "lib.rs",
        vec![
            Item::use_(UseDecl::named(ImportPath::plain(["util", "Helper"]))).public(),
            Item::use_(UseDecl::named(ImportPath::plain(["util", "Secret"]))),
        ],
    );
    let data = CrateData::new(local_crate(), lib, fx.root_dir)
        .with_dependency(Dependency::new("util", util));

    let map = fx.build_with_deps(&data, deps);

    assert!(map.root_module().get_visible_item("Helper").is_some());
    assert!(
        map.root_module().get_visible_item("Secret").is_none(),
        "crate-private items must not leak across crates"
    );
}

#[test]
fn extern_crate_rename_rebinds_extern_prelude() {
    let util = CrateId::new(3);
    let mut deps = HashMap::new();
    deps.insert(util, dependency_map(util, &["Helper"], &[]));

    let mut fx = Fixture::new();
    let lib = fx.add_file(
        fx.root_dir,
        "lib.rs",
        vec![Item::extern_crate_as("util", "u")],
    );
    let data = CrateData::new(local_crate(), lib, fx.root_dir)
        .with_edition(Edition::Edition2015)
        .with_dependency(Dependency::new("util", util));

    let map = fx.build_with_deps(&data, deps);

    let rebound = map.extern_prelude.get("u").expect("rename not recorded");
    assert_eq!(rebound.krate, util);
    assert!(map.root_module().get_visible_item("u").is_some());
}

#[test]
fn enum_glob_imports_variants() {
    let mut fx = Fixture::new();
    let lib = fx.add_file(
        fx.root_dir,
        "lib.rs",
        vec![
            Item::enum_("E", ["A", "B"]).public(),
            Item::use_(UseDecl::glob(ImportPath::plain(["E"]))),
        ],
    );

    let map = fx.build(&CrateData::new(local_crate(), lib, fx.root_dir));
    let root = map.root_module();
    let a = root.get_visible_item("A").expect("variant A not imported");
    assert!(a.types.is_some() && a.values.is_some());
    assert!(root.get_visible_item("B").is_some());
}

#[test]
fn unnamed_trait_import_is_tracked() {
    let mut fx = Fixture::new();
    fx.add_file(fx.root_dir, "m.rs", vec![Item::trait_("Ext").public()]);
    let lib = fx.add_file(
        fx.root_dir,
        "lib.rs",
        vec![
            Item::mod_outline("m"),
            Item::use_(UseDecl::named(ImportPath::plain(["m", "Ext"])).with_alias("_")),
        ],
    );

    let map = fx.build(&CrateData::new(local_crate(), lib, fx.root_dir));
    let root = map.root_module();
    assert!(root.get_visible_item("Ext").is_none());
    assert!(root.get_visible_item("_").is_none());
    let trait_path = ModPath::new(local_crate(), ["m", "Ext"]);
    assert!(root.unnamed_trait_imports.contains_key(&trait_path));
}

#[test]
fn outline_modules_nest_through_directories() {
    let mut fx = Fixture::new();
    let sub = fx.add_dir(fx.root_dir, "outer");
    fx.add_file(sub, "inner.rs", vec![Item::struct_("Deep").public()]);
    fx.add_file(sub, "mod.rs", vec![Item::mod_outline("inner")]);
    let lib = fx.add_file(fx.root_dir, "lib.rs", vec![Item::mod_outline("outer")]);

    let map = fx.build(&CrateData::new(local_crate(), lib, fx.root_dir));

    let outer = *map.root_module().child_modules.get("outer").unwrap();
    let inner = *map.module(outer).child_modules.get("inner").unwrap();
    assert!(map.module(inner).get_visible_item("Deep").is_some());
    // `outer.rs` was probed before `outer/mod.rs` and recorded missed.
    assert_eq!(map.missed_files, vec!["/src/outer.rs".to_string()]);
}

#[test]
fn rebuild_is_deterministic() {
    let mut fx = Fixture::new();
    fx.add_file(
        fx.root_dir,
        "m.rs",
        vec![Item::struct_("T").public(), Item::struct_("U").public()],
    );
    let lib = fx.add_file(
        fx.root_dir,
        "lib.rs",
        vec![
            Item::mod_outline("m"),
            Item::use_(UseDecl::glob(ImportPath::plain(["m"]))).public(),
            Item::use_(UseDecl::named(ImportPath::plain(["m", "T"]))),
            Item::mod_outline("gone"),
        ],
    );
    let data = CrateData::new(local_crate(), lib, fx.root_dir);

    let snapshot = |map: &CrateDefMap| {
        let root = map.root_module();
        (
            root.visible_items
                .iter()
                .map(|(name, per_ns)| (name.clone(), per_ns.clone()))
                .collect::<Vec<_>>(),
            map.extern_prelude.keys().cloned().collect::<Vec<_>>(),
            map.missed_files.clone(),
        )
    };

    let first = fx.build(&data);
    let second = fx.build(&data);
    assert_eq!(snapshot(&first), snapshot(&second));
}

#[test]
fn unindexable_crate_builds_nothing() {
    let mut fx = Fixture::new();
    let lib = fx.add_file(fx.root_dir, "lib.rs", vec![]);
    let data = CrateData::new(local_crate(), lib, fx.root_dir).not_indexable();
    let token = BuildToken::new();
    let result =
        build_crate_def_map(&data, HashMap::new(), &fx.host, &fx.host, &token).unwrap();
    assert!(result.is_none());

    // Same when the root file has no parsed tree.
    let data = CrateData::new(local_crate(), FileId::new(777), fx.root_dir);
    let result =
        build_crate_def_map(&data, HashMap::new(), &fx.host, &fx.host, &token).unwrap();
    assert!(result.is_none());
}

#[test]
fn cancellation_discards_the_build() {
    let mut fx = Fixture::new();
    let lib = fx.add_file(fx.root_dir, "lib.rs", vec![Item::struct_("S").public()]);
    let data = CrateData::new(local_crate(), lib, fx.root_dir);

    let token = BuildToken::new();
    token.cancel();
    let err = build_crate_def_map(&data, HashMap::new(), &fx.host, &fx.host, &token)
        .expect_err("cancelled build must not return a map");
    assert!(err.is_cancelled());
}
