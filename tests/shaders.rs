use std::collections::BTreeSet;

use sandplane::render::shaders::{FLAT_SHADER, FRAGMENT_ENTRY, SURFACE_SHADER, VERTEX_ENTRY};
use wgpu::naga;

fn parse_and_validate(source: &str) -> naga::Module {
    let module = naga::front::wgsl::parse_str(source).expect("WGSL parses");
    naga::valid::Validator::new(
        naga::valid::ValidationFlags::all(),
        naga::valid::Capabilities::all(),
    )
    .validate(&module)
    .expect("WGSL validates");
    module
}

fn resource_bindings(module: &naga::Module) -> BTreeSet<(u32, u32)> {
    module
        .global_variables
        .iter()
        .filter_map(|(_, var)| var.binding.as_ref())
        .map(|binding| (binding.group, binding.binding))
        .collect()
}

fn vertex_input_locations(module: &naga::Module) -> BTreeSet<u32> {
    let entry = module
        .entry_points
        .iter()
        .find(|ep| ep.name == VERTEX_ENTRY)
        .expect("vertex entry point");
    let mut locations = BTreeSet::new();
    for argument in &entry.function.arguments {
        if let Some(naga::Binding::Location { location, .. }) = argument.binding {
            locations.insert(location);
        }
        if let naga::TypeInner::Struct { members, .. } = &module.types[argument.ty].inner {
            for member in members {
                if let Some(naga::Binding::Location { location, .. }) = member.binding {
                    locations.insert(location);
                }
            }
        }
    }
    locations
}

fn assert_entry_points(module: &naga::Module) {
    let stages: Vec<_> = module
        .entry_points
        .iter()
        .map(|ep| (ep.name.as_str(), ep.stage))
        .collect();
    assert!(stages.contains(&(VERTEX_ENTRY, naga::ShaderStage::Vertex)));
    assert!(stages.contains(&(FRAGMENT_ENTRY, naga::ShaderStage::Fragment)));
}

#[test]
fn surface_shader_validates_with_expected_interface() {
    let module = parse_and_validate(SURFACE_SHADER);
    assert_entry_points(&module);
    assert_eq!(
        resource_bindings(&module),
        BTreeSet::from([(0, 0), (1, 0), (2, 0), (2, 1), (2, 2), (2, 3)])
    );
    assert_eq!(vertex_input_locations(&module), (0..12).collect());
}

#[test]
fn flat_shader_validates_with_camera_only() {
    let module = parse_and_validate(FLAT_SHADER);
    assert_entry_points(&module);
    assert_eq!(resource_bindings(&module), BTreeSet::from([(0, 0)]));
    assert_eq!(vertex_input_locations(&module), (0..12).collect());
}
