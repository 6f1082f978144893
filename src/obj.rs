use std::collections::HashMap;

use anyhow::{anyhow, Context, Result};
use glam::{Vec2, Vec3, Vec4};

use crate::mesh::{Mesh, Vertex};

/// Parses a Wavefront OBJ file from memory into a flat-pass [`Mesh`].
///
/// Polygons are fan-triangulated. Vertices without a `vn` reference get
/// area-weighted face normals; missing `vt` references map to `(0, 0)`.
pub fn load_obj_from_str(data: &str) -> Result<Mesh> {
    let mut positions = Vec::new();
    let mut tex_coords = Vec::new();
    let mut normals = Vec::new();
    let mut faces: Vec<[FaceIndex; 3]> = Vec::new();

    for (line_no, line) in data.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let mut parts = trimmed.split_whitespace();
        let Some(tag) = parts.next() else {
            continue;
        };
        match tag {
            "v" => positions.push(
                parse_vec3(parts)
                    .with_context(|| format!("invalid vertex on line {}", line_no + 1))?,
            ),
            "vt" => tex_coords.push(
                parse_vec2(parts)
                    .with_context(|| format!("invalid texture coordinate on line {}", line_no + 1))?,
            ),
            "vn" => normals.push(
                parse_vec3(parts)
                    .with_context(|| format!("invalid normal on line {}", line_no + 1))?,
            ),
            "f" => {
                let polygon = parse_face(parts)
                    .with_context(|| format!("invalid face on line {}", line_no + 1))?;
                triangulate_face(&polygon, &mut faces);
            }
            _ => {}
        }
    }

    if positions.is_empty() {
        return Err(anyhow!("OBJ file does not define any vertices"));
    }

    let (mut mesh, missing_normals) = build_mesh(&positions, &tex_coords, &normals, &faces)?;
    if missing_normals {
        compute_normals(&mut mesh);
    }
    Ok(mesh)
}

fn parse_component<'a>(parts: &mut impl Iterator<Item = &'a str>) -> Result<f32> {
    Ok(parts
        .next()
        .ok_or_else(|| anyhow!("missing vector component"))?
        .parse::<f32>()?)
}

fn parse_vec3<'a>(mut parts: impl Iterator<Item = &'a str>) -> Result<Vec3> {
    let x = parse_component(&mut parts)?;
    let y = parse_component(&mut parts)?;
    let z = parse_component(&mut parts)?;
    Ok(Vec3::new(x, y, z))
}

fn parse_vec2<'a>(mut parts: impl Iterator<Item = &'a str>) -> Result<Vec2> {
    let u = parse_component(&mut parts)?;
    let v = parse_component(&mut parts)?;
    Ok(Vec2::new(u, v))
}

fn parse_face<'a>(parts: impl Iterator<Item = &'a str>) -> Result<Vec<FaceIndex>> {
    let mut indices = Vec::new();
    for part in parts {
        let mut segments = part.split('/');
        let v = segments
            .next()
            .ok_or_else(|| anyhow!("missing vertex index"))?
            .parse::<i32>()?;
        let vt = parse_optional_index(segments.next())?;
        let vn = parse_optional_index(segments.next())?;
        indices.push(FaceIndex { v, vt, vn });
    }
    if indices.len() < 3 {
        return Err(anyhow!("faces must reference at least 3 vertices"));
    }
    Ok(indices)
}

fn parse_optional_index(segment: Option<&str>) -> Result<i32> {
    match segment {
        None | Some("") => Ok(0),
        Some(s) => Ok(s.parse::<i32>()?),
    }
}

fn triangulate_face(polygon: &[FaceIndex], faces: &mut Vec<[FaceIndex; 3]>) {
    for i in 1..(polygon.len() - 1) {
        faces.push([polygon[0], polygon[i], polygon[i + 1]]);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct Key {
    position: usize,
    tex_coord: Option<usize>,
    normal: Option<usize>,
}

#[derive(Debug, Clone, Copy)]
struct FaceIndex {
    v: i32,
    vt: i32,
    vn: i32,
}

fn build_mesh(
    positions: &[Vec3],
    tex_coords: &[Vec2],
    normals: &[Vec3],
    faces: &[[FaceIndex; 3]],
) -> Result<(Mesh, bool)> {
    let mut lookup: HashMap<Key, u32> = HashMap::new();
    let mut mesh = Mesh::default();
    let mut missing_normals = false;

    for face in faces {
        for idx in face {
            let position =
                fix_index(idx.v, positions.len()).ok_or_else(|| anyhow!("invalid vertex index"))?;
            let key = Key {
                position,
                tex_coord: fix_index(idx.vt, tex_coords.len()),
                normal: fix_index(idx.vn, normals.len()),
            };
            missing_normals |= key.normal.is_none();
            let next_index = mesh.vertices.len() as u32;
            let entry = *lookup.entry(key).or_insert_with(|| {
                let normal = key.normal.map(|i| normals[i]).unwrap_or(Vec3::ZERO);
                let uv = key.tex_coord.map(|i| tex_coords[i]).unwrap_or(Vec2::ZERO);
                mesh.vertices
                    .push(Vertex::new(positions[position], normal, uv.into()));
                next_index
            });
            mesh.indices.push(entry);
        }
    }

    Ok((mesh, missing_normals))
}

fn fix_index(index: i32, len: usize) -> Option<usize> {
    if index > 0 {
        let zero_based = index as usize - 1;
        (zero_based < len).then_some(zero_based)
    } else if index < 0 {
        let abs = index.unsigned_abs() as usize;
        (abs <= len).then_some(len - abs)
    } else {
        None
    }
}

/// Replaces every normal with the normalized sum of adjacent face normals.
fn compute_normals(mesh: &mut Mesh) {
    let mut accum = vec![Vec3::ZERO; mesh.vertices.len()];
    let position = |mesh: &Mesh, i: usize| Vec4::from(mesh.vertices[i].position).truncate();

    for triangle in mesh.indices.chunks_exact(3) {
        let [i0, i1, i2] = [triangle[0], triangle[1], triangle[2]].map(|i| i as usize);
        let p0 = position(mesh, i0);
        let normal = (position(mesh, i1) - p0).cross(position(mesh, i2) - p0);
        accum[i0] += normal;
        accum[i1] += normal;
        accum[i2] += normal;
    }

    for (vertex, normal) in mesh.vertices.iter_mut().zip(accum) {
        vertex.normal = normal.normalize_or_zero().extend(1.0).into();
    }
}
