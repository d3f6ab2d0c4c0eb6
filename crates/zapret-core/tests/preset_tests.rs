//! Integration tests for preset parsing, rendering and the preset store

use proptest::prelude::*;
use zapret_core::preset::{CategoryBlock, Preset, PresetStore, Protocol};

const SAMPLE: &str = "\
# Preset: Default
# Created: 2024-05-01 10:00:00
# IconColor: #4CAF50
# Description: YouTube and Discord

--wf-tcp=80,443
--wf-udp=443,50000-50100

--filter-tcp=443
--hostlist=lists/list-youtube.txt
--dpi-desync=fake,multisplit
--dpi-desync-repeats=6

--new

--filter-udp=443
--hostlist=lists/list-youtube.txt
--dpi-desync=fake

--new

--filter-udp=50000-50100
--ipset=lists/ipset-discord.txt
--dpi-desync=fake
--out-range=-n8
";

// ===== Parse Tests =====

#[test]
fn test_parse_sample() {
    let preset = Preset::parse(SAMPLE).unwrap();
    assert_eq!(preset.name(), "Default");
    assert_eq!(preset.header.icon_color.as_deref(), Some("#4CAF50"));
    assert_eq!(preset.base_args, ["--wf-tcp=80,443", "--wf-udp=443,50000-50100"]);
    assert_eq!(preset.categories(), ["youtube", "discord"]);

    let discord = preset.block("discord", Some(Protocol::Udp)).unwrap();
    assert_eq!(discord.ports, "50000-50100");
    assert_eq!(discord.out_range().unwrap().unwrap().value, 8);
}

#[test]
fn test_parse_crlf() {
    let crlf = SAMPLE.replace('\n', "\r\n");
    assert_eq!(Preset::parse(&crlf).unwrap(), Preset::parse(SAMPLE).unwrap());
}

#[test]
fn test_render_parse_is_stable() {
    let preset = Preset::parse(SAMPLE).unwrap();
    let rendered = preset.render();
    let reparsed = Preset::parse(&rendered).unwrap();
    assert_eq!(reparsed, preset);
    assert_eq!(reparsed.render(), rendered);
}

// ===== Store Tests =====

#[test]
fn test_store_lifecycle() {
    let dir = tempfile::tempdir().unwrap();
    let mirror = dir.path().join("preset-active.txt");
    let store = PresetStore::new(dir.path().join("presets"), &mirror);

    let mut preset = Preset::parse(SAMPLE).unwrap();
    preset.header.name = "Main".into();
    store.create(preset).unwrap();
    store.activate("Main").unwrap();
    assert_eq!(store.active_name().unwrap().as_deref(), Some("Main"));

    let args = vec!["--dpi-desync=fake --dpi-desync-autottl=2".to_string()];
    store.apply_strategy("Main", "youtube", Some(Protocol::Tcp), &args).unwrap();

    let mirrored = Preset::parse(&std::fs::read_to_string(&mirror).unwrap()).unwrap();
    assert_eq!(mirrored.header.active_preset.as_deref(), Some("Main"));
    let block = mirrored.block("youtube", Some(Protocol::Tcp)).unwrap();
    assert_eq!(block.strategy_args, ["--dpi-desync=fake", "--dpi-desync-autottl=2"]);
    assert_eq!(block.filter_args, ["--hostlist=lists/list-youtube.txt"]);

    store.rename("Main", "Renamed").unwrap();
    assert_eq!(store.active_name().unwrap().as_deref(), Some("Renamed"));

    store.delete("Renamed").unwrap();
    assert_eq!(store.active_name().unwrap(), None);
    assert!(!mirror.exists());
}

#[test]
fn test_store_file_name_wins_over_header_name() {
    let dir = tempfile::tempdir().unwrap();
    let presets = dir.path().join("presets");
    let mirror = dir.path().join("preset-active.txt");
    std::fs::create_dir_all(&presets).unwrap();
    std::fs::write(presets.join("bar.txt"), SAMPLE.replace("# Preset: Default", "# Preset: Foo")).unwrap();
    let store = PresetStore::new(&presets, &mirror);

    assert_eq!(store.load("bar").unwrap().name(), "bar");
    store.activate("bar").unwrap();
    store
        .apply_strategy("bar", "youtube", None, &["--dpi-desync=split".to_string()])
        .unwrap();

    assert!(!presets.join("Foo.txt").exists());
    let saved = Preset::parse(&std::fs::read_to_string(presets.join("bar.txt")).unwrap()).unwrap();
    assert_eq!(saved.name(), "bar");
    assert_eq!(
        saved.block("youtube", Some(Protocol::Tcp)).unwrap().strategy_args,
        ["--dpi-desync=split"]
    );

    let mirrored = std::fs::read_to_string(&mirror).unwrap();
    assert!(mirrored.contains("--dpi-desync=split"));
    assert!(mirrored.contains("# ActivePreset: bar"));
}

#[test]
fn test_store_rejects_names_outside_directory() {
    let dir = tempfile::tempdir().unwrap();
    let presets = dir.path().join("presets");
    std::fs::create_dir_all(&presets).unwrap();
    let outside = dir.path().join("x.txt");
    std::fs::write(&outside, SAMPLE).unwrap();
    let store = PresetStore::new(&presets, dir.path().join("preset-active.txt"));

    assert!(store.delete("../x").is_err());
    assert!(store.load("../x").is_err());
    assert!(store.activate("../x").is_err());
    assert!(store.export("../x", &dir.path().join("copy.txt")).is_err());
    assert!(outside.exists());
    assert_eq!(store.active_name().unwrap(), None);
}

// ===== Property Tests =====

fn protocol() -> impl Strategy<Value = Protocol> {
    prop_oneof![Just(Protocol::Tcp), Just(Protocol::Udp)]
}

fn ports() -> impl Strategy<Value = String> {
    prop_oneof![
        (1u16..=65535).prop_map(|p| p.to_string()),
        (1u16..=30000, 1u16..=30000).prop_map(|(a, b)| format!("{a}-{}", a + b)),
        Just("80,443".to_string()),
    ]
}

fn strategy_arg() -> impl Strategy<Value = String> {
    prop_oneof![
        prop::sample::select(vec!["fake", "multisplit", "split2", "disorder2", "syndata"])
            .prop_map(|t| format!("--dpi-desync={t}")),
        (1u8..=20).prop_map(|n| format!("--dpi-desync-repeats={n}")),
        (1u32..=64).prop_map(|n| format!("--out-range=-n{n}")),
        Just("--dpi-desync-fooling=badseq".to_string()),
    ]
}

fn block() -> impl Strategy<Value = CategoryBlock> {
    (
        protocol(),
        ports(),
        "[a-z]{2,10}",
        prop::collection::vec(strategy_arg(), 0..5),
    )
        .prop_map(|(protocol, ports, list, args)| {
            let mut block = CategoryBlock::new(protocol, ports, &format!("lists/{list}.txt"));
            block.set_strategy(args);
            block
        })
}

fn preset() -> impl Strategy<Value = Preset> {
    (
        "[A-Za-z][A-Za-z0-9 _-]{0,20}",
        prop::collection::vec(prop_oneof![Just("--wf-tcp=80,443"), Just("--wf-udp=443")], 0..3),
        prop::collection::vec(block(), 0..6),
    )
        .prop_map(|(name, base, blocks)| {
            let mut preset = Preset::new(name.trim());
            preset.base_args = base.into_iter().map(str::to_string).collect();
            preset.blocks = blocks;
            preset
        })
}

proptest! {
    #[test]
    fn prop_render_parse_roundtrip(preset in preset()) {
        let parsed = Preset::parse(&preset.render()).unwrap();
        prop_assert_eq!(parsed.name(), preset.name());
        prop_assert_eq!(&parsed.base_args, &preset.base_args);
        prop_assert_eq!(parsed.blocks.len(), preset.blocks.len());
        for (a, b) in parsed.blocks.iter().zip(&preset.blocks) {
            prop_assert_eq!(&a.category, &b.category);
            prop_assert_eq!(a.protocol, b.protocol);
            prop_assert_eq!(&a.ports, &b.ports);
            prop_assert_eq!(&a.strategy_args, &b.strategy_args);
        }
    }
}
