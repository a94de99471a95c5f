//! Splat PLY format parser and point-cloud export.
//!
//! Gaussian-splat PLY files are self-describing: the ASCII header
//! declares an arbitrary list of per-vertex properties, and the data
//! section (ASCII or binary, either byte order) carries them in
//! declared order. Positions come from the `x`/`y`/`z` properties;
//! every other property is read generically into a by-name attribute
//! table, with a small registry of recognized name-groups driving
//! color synthesis and vector/quaternion grouping.

use crate::core::sigmoid;
use crate::io::LoadError;
use byteorder::{BigEndian, LittleEndian, ReadBytesExt};
use nalgebra::{Vector3, Vector4};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Read, Write};
use std::path::Path;

/// Scalar property types a PLY header may declare, with their canonical
/// and sized-alias tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyType {
    Char,
    UChar,
    Short,
    UShort,
    Int,
    UInt,
    Float,
    Double,
}

impl PropertyType {
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "char" | "int8" => Some(Self::Char),
            "uchar" | "uint8" => Some(Self::UChar),
            "short" | "int16" => Some(Self::Short),
            "ushort" | "uint16" => Some(Self::UShort),
            "int" | "int32" => Some(Self::Int),
            "uint" | "uint32" => Some(Self::UInt),
            "float" | "float32" => Some(Self::Float),
            "double" | "float64" => Some(Self::Double),
            _ => None,
        }
    }

    /// Encoded width in bytes.
    pub fn size(self) -> usize {
        match self {
            Self::Char | Self::UChar => 1,
            Self::Short | Self::UShort => 2,
            Self::Int | Self::UInt | Self::Float => 4,
            Self::Double => 8,
        }
    }

    /// Integer-typed sources store color in 0-255 and need rescaling.
    pub fn is_integer(self) -> bool {
        !matches!(self, Self::Float | Self::Double)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PlyFormat {
    Ascii,
    BinaryLittleEndian,
    BinaryBigEndian,
}

#[derive(Debug)]
struct PlyHeader {
    format: PlyFormat,
    vertex_count: usize,
    /// Vertex properties in declared order.
    properties: Vec<(PropertyType, String)>,
}

/// How zeroth-order SH coefficients (`f_dc_*`) become display colors.
///
/// The sigmoid activation matches common splat viewers; the linear
/// `0.5·v + 0.5` mapping is an alternative seen alongside it. Neither is
/// the exact SH-to-radiance decode (which scales by the Y00 constant);
/// both are approximations good enough for preview coloring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ColorStrategy {
    /// Per-channel logistic activation 1/(1+e^-v).
    #[default]
    Sigmoid,
    /// Per-channel linear map v·0.5 + 0.5, clamped to [0, 1].
    Linear,
}

impl ColorStrategy {
    fn activate(self, v: f32) -> f32 {
        match self {
            Self::Sigmoid => sigmoid(v),
            Self::Linear => (v * 0.5 + 0.5).clamp(0.0, 1.0),
        }
    }
}

/// Options for [`load_splat_ply`].
#[derive(Debug, Clone)]
pub struct PlyOptions {
    /// Clouds above this size are uniformly subsampled down to it.
    pub max_points: usize,

    /// Seed for the subsample selection; same seed, same subset.
    pub seed: u64,

    /// SH-to-color activation.
    pub color_strategy: ColorStrategy,
}

impl Default for PlyOptions {
    fn default() -> Self {
        Self {
            max_points: 200_000,
            seed: 0,
            color_strategy: ColorStrategy::default(),
        }
    }
}

/// A per-vertex attribute: a raw scalar column, or a recognized
/// composite group.
#[derive(Debug, Clone, PartialEq)]
pub enum Attribute {
    Scalar(Vec<f32>),
    Vec3(Vec<Vector3<f32>>),
    Vec4(Vec<Vector4<f32>>),
}

impl Attribute {
    /// Number of vertices this attribute covers.
    pub fn len(&self) -> usize {
        match self {
            Self::Scalar(v) => v.len(),
            Self::Vec3(v) => v.len(),
            Self::Vec4(v) => v.len(),
        }
    }

    /// True when the attribute holds no vertices. Attributes loaded from
    /// a file are never empty; this exists for callers building clouds
    /// by hand.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn retain_indices(&self, indices: &[usize]) -> Self {
        match self {
            Self::Scalar(v) => Self::Scalar(indices.iter().map(|&i| v[i]).collect()),
            Self::Vec3(v) => Self::Vec3(indices.iter().map(|&i| v[i]).collect()),
            Self::Vec4(v) => Self::Vec4(indices.iter().map(|&i| v[i]).collect()),
        }
    }
}

/// A loaded splat cloud. Positions, colors and every attribute array
/// always have the same length, including after subsampling.
#[derive(Debug, Clone, Default)]
pub struct SplatCloud {
    /// Vertex positions in file coordinates (no axis remap applied)
    pub positions: Vec<Vector3<f32>>,

    /// Derived 0-1 RGB colors, one per vertex
    pub colors: Vec<Vector3<f32>>,

    /// Remaining per-vertex attributes by name, plus composite groups
    pub attributes: BTreeMap<String, Attribute>,
}

impl SplatCloud {
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}

/// What a recognized name-group decodes into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GroupKind {
    /// Direct 0-255 or 0-1 color channels
    BaseColor,
    /// Zeroth-order SH coefficients, activated per [`ColorStrategy`]
    ShColor,
    /// Composite 3-vector attribute
    Vec3,
    /// Composite 4-vector (quaternion) attribute
    Vec4,
}

struct NameGroup {
    /// Attribute name the composite is stored under (None for color groups)
    group_name: Option<&'static str>,
    members: &'static [&'static str],
    kind: GroupKind,
}

/// Fixed registry of recognized name-groups. Properties outside these
/// groups pass through as raw named scalars.
const NAME_GROUPS: &[NameGroup] = &[
    NameGroup {
        group_name: None,
        members: &["red", "green", "blue"],
        kind: GroupKind::BaseColor,
    },
    NameGroup {
        group_name: None,
        members: &["f_dc_0", "f_dc_1", "f_dc_2"],
        kind: GroupKind::ShColor,
    },
    NameGroup {
        group_name: Some("scale"),
        members: &["scale_0", "scale_1", "scale_2"],
        kind: GroupKind::Vec3,
    },
    NameGroup {
        group_name: Some("rotation"),
        members: &["rot_0", "rot_1", "rot_2", "rot_3"],
        kind: GroupKind::Vec4,
    },
];

/// Load a gaussian-splat PLY file.
///
/// Header errors and truncation are fatal for the whole file: a short
/// record would desynchronize the parallel attribute arrays, so nothing
/// partial is returned here (unlike the COLMAP reader).
pub fn load_splat_ply(path: &Path, options: &PlyOptions) -> Result<SplatCloud, LoadError> {
    let file = File::open(path).map_err(|e| {
        if e.kind() == io::ErrorKind::NotFound {
            LoadError::NotFound(path.to_path_buf())
        } else {
            LoadError::Io(e)
        }
    })?;
    let mut reader = BufReader::new(file);

    let header = parse_header(&mut reader)?;
    log::debug!(
        "loading {} vertices ({:?}), {} properties",
        header.vertex_count,
        header.format,
        header.properties.len()
    );

    let columns = match header.format {
        PlyFormat::Ascii => read_ascii_rows(&mut reader, &header, path)?,
        PlyFormat::BinaryLittleEndian => read_binary_rows(&mut reader, &header, path, true)?,
        PlyFormat::BinaryBigEndian => read_binary_rows(&mut reader, &header, path, false)?,
    };

    let mut cloud = assemble_cloud(&header, columns, options.color_strategy)?;

    if cloud.len() > options.max_points {
        let indices = subsample_indices(cloud.len(), options.max_points, options.seed);
        log::debug!(
            "subsampling splat cloud from {} to {} points (seed {})",
            cloud.len(),
            indices.len(),
            options.seed
        );
        cloud = apply_indices(cloud, &indices);
    }

    Ok(cloud)
}

fn parse_header<R: BufRead>(reader: &mut R) -> Result<PlyHeader, LoadError> {
    let magic = read_header_line(reader)?;
    if magic != "ply" {
        return Err(LoadError::MalformedHeader(format!(
            "expected 'ply' magic, found '{}'",
            magic
        )));
    }

    let mut format = None;
    let mut vertex_count = None;
    let mut properties = Vec::new();
    let mut in_vertex_element = false;

    loop {
        let line = read_header_line(reader)?;
        let mut tokens = line.split_whitespace();
        match tokens.next() {
            Some("format") => {
                format = Some(match tokens.next() {
                    Some("ascii") => PlyFormat::Ascii,
                    Some("binary_little_endian") => PlyFormat::BinaryLittleEndian,
                    Some("binary_big_endian") => PlyFormat::BinaryBigEndian,
                    other => {
                        return Err(LoadError::MalformedHeader(format!(
                            "unsupported format '{}'",
                            other.unwrap_or("")
                        )))
                    }
                });
            }
            Some("element") => {
                let name = tokens.next().unwrap_or("");
                in_vertex_element = name == "vertex";
                if in_vertex_element {
                    let count = tokens.next().and_then(|t| t.parse::<usize>().ok());
                    vertex_count = Some(count.ok_or_else(|| {
                        LoadError::MalformedHeader("bad vertex element count".to_string())
                    })?);
                }
            }
            Some("property") if in_vertex_element => {
                let type_token = tokens.next().unwrap_or("");
                if type_token == "list" {
                    return Err(LoadError::MalformedHeader(
                        "list properties are not supported for vertex data".to_string(),
                    ));
                }
                let prop_type = PropertyType::from_token(type_token).ok_or_else(|| {
                    LoadError::MalformedHeader(format!("unknown property type '{}'", type_token))
                })?;
                let name = tokens.next().ok_or_else(|| {
                    LoadError::MalformedHeader("property line missing name".to_string())
                })?;
                properties.push((prop_type, name.to_string()));
            }
            Some("property") | Some("comment") | Some("obj_info") => {}
            Some("end_header") => break,
            Some(other) => {
                return Err(LoadError::MalformedHeader(format!(
                    "unexpected header token '{}'",
                    other
                )));
            }
            None => {}
        }
    }

    let format =
        format.ok_or_else(|| LoadError::MalformedHeader("missing format line".to_string()))?;
    let vertex_count = vertex_count
        .ok_or_else(|| LoadError::MalformedHeader("missing vertex element".to_string()))?;
    if properties.is_empty() {
        return Err(LoadError::MalformedHeader(
            "vertex element declares no properties".to_string(),
        ));
    }

    Ok(PlyHeader {
        format,
        vertex_count,
        properties,
    })
}

/// Read one header line without assuming the rest of the file is UTF-8.
fn read_header_line<R: BufRead>(reader: &mut R) -> Result<String, LoadError> {
    let mut bytes = Vec::new();
    let n = reader.read_until(b'\n', &mut bytes)?;
    if n == 0 {
        return Err(LoadError::MalformedHeader(
            "unexpected end of file in header".to_string(),
        ));
    }
    Ok(String::from_utf8_lossy(&bytes).trim().to_string())
}

/// Read the ASCII data section into one column per declared property.
fn read_ascii_rows<R: BufRead>(
    reader: &mut R,
    header: &PlyHeader,
    path: &Path,
) -> Result<Vec<Vec<f32>>, LoadError> {
    let mut columns = vec![Vec::with_capacity(header.vertex_count); header.properties.len()];

    let mut line = String::new();
    for row in 0..header.vertex_count {
        line.clear();
        if reader.read_line(&mut line)? == 0 {
            return Err(truncated(path, row, header.vertex_count));
        }
        let tokens: Vec<&str> = line.split_whitespace().collect();
        if tokens.len() < header.properties.len() {
            // A short line must not be padded or silently dropped.
            return Err(truncated(path, row, header.vertex_count));
        }
        for (col, token) in columns.iter_mut().zip(&tokens) {
            let value: f32 = token.parse().map_err(|_| {
                LoadError::Io(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("invalid numeric token '{}' in vertex {}", token, row),
                ))
            })?;
            col.push(value);
        }
    }

    Ok(columns)
}

/// Read the binary data section into one column per declared property.
fn read_binary_rows<R: Read>(
    reader: &mut R,
    header: &PlyHeader,
    path: &Path,
    little_endian: bool,
) -> Result<Vec<Vec<f32>>, LoadError> {
    let mut columns = vec![Vec::with_capacity(header.vertex_count); header.properties.len()];

    for row in 0..header.vertex_count {
        for ((prop_type, _), col) in header.properties.iter().zip(columns.iter_mut()) {
            let value = read_scalar(reader, *prop_type, little_endian).map_err(|e| {
                if e.kind() == io::ErrorKind::UnexpectedEof {
                    truncated(path, row, header.vertex_count)
                } else {
                    LoadError::Io(e)
                }
            })?;
            col.push(value);
        }
    }

    Ok(columns)
}

fn read_scalar<R: Read>(
    reader: &mut R,
    prop_type: PropertyType,
    little_endian: bool,
) -> io::Result<f32> {
    use PropertyType::*;
    let v = if little_endian {
        match prop_type {
            Char => reader.read_i8()? as f32,
            UChar => reader.read_u8()? as f32,
            Short => reader.read_i16::<LittleEndian>()? as f32,
            UShort => reader.read_u16::<LittleEndian>()? as f32,
            Int => reader.read_i32::<LittleEndian>()? as f32,
            UInt => reader.read_u32::<LittleEndian>()? as f32,
            Float => reader.read_f32::<LittleEndian>()?,
            Double => reader.read_f64::<LittleEndian>()? as f32,
        }
    } else {
        match prop_type {
            Char => reader.read_i8()? as f32,
            UChar => reader.read_u8()? as f32,
            Short => reader.read_i16::<BigEndian>()? as f32,
            UShort => reader.read_u16::<BigEndian>()? as f32,
            Int => reader.read_i32::<BigEndian>()? as f32,
            UInt => reader.read_u32::<BigEndian>()? as f32,
            Float => reader.read_f32::<BigEndian>()?,
            Double => reader.read_f64::<BigEndian>()? as f32,
        }
    };
    Ok(v)
}

fn truncated(path: &Path, row: usize, expected: usize) -> LoadError {
    LoadError::Truncated {
        path: path.to_path_buf(),
        context: format!("vertex {} of {}", row, expected),
    }
}

/// Build positions, colors and the attribute table from raw columns.
fn assemble_cloud(
    header: &PlyHeader,
    columns: Vec<Vec<f32>>,
    strategy: ColorStrategy,
) -> Result<SplatCloud, LoadError> {
    let index_of = |name: &str| {
        header
            .properties
            .iter()
            .position(|(_, n)| n == name)
    };

    let (xi, yi, zi) = match (index_of("x"), index_of("y"), index_of("z")) {
        (Some(x), Some(y), Some(z)) => (x, y, z),
        _ => {
            return Err(LoadError::MalformedHeader(
                "vertex element lacks x/y/z position properties".to_string(),
            ))
        }
    };

    let n = header.vertex_count;
    let positions: Vec<Vector3<f32>> = (0..n)
        .map(|i| Vector3::new(columns[xi][i], columns[yi][i], columns[zi][i]))
        .collect();

    // Everything except the position triple passes through by name.
    let mut attributes: BTreeMap<String, Attribute> = BTreeMap::new();
    for (idx, (_, name)) in header.properties.iter().enumerate() {
        if idx == xi || idx == yi || idx == zi {
            continue;
        }
        attributes.insert(name.clone(), Attribute::Scalar(columns[idx].clone()));
    }

    let colors = derive_colors(header, &columns, n, strategy, &index_of);

    // Composite groups from the registry, added alongside their members.
    for group in NAME_GROUPS {
        let Some(group_name) = group.group_name else {
            continue;
        };
        let member_cols: Option<Vec<usize>> =
            group.members.iter().map(|&m| index_of(m)).collect();
        let Some(member_cols) = member_cols else {
            continue;
        };
        let composite = match group.kind {
            GroupKind::Vec3 => Attribute::Vec3(
                (0..n)
                    .map(|i| {
                        Vector3::new(
                            columns[member_cols[0]][i],
                            columns[member_cols[1]][i],
                            columns[member_cols[2]][i],
                        )
                    })
                    .collect(),
            ),
            GroupKind::Vec4 => Attribute::Vec4(
                (0..n)
                    .map(|i| {
                        Vector4::new(
                            columns[member_cols[0]][i],
                            columns[member_cols[1]][i],
                            columns[member_cols[2]][i],
                            columns[member_cols[3]][i],
                        )
                    })
                    .collect(),
            ),
            // Color groups carry no group_name and were skipped above.
            GroupKind::BaseColor | GroupKind::ShColor => continue,
        };
        attributes.insert(group_name.to_string(), composite);
    }

    Ok(SplatCloud {
        positions,
        colors,
        attributes,
    })
}

/// Color synthesis, first match wins: direct base-color triple, then
/// activated SH coefficients, then uniform mid-gray.
fn derive_colors(
    header: &PlyHeader,
    columns: &[Vec<f32>],
    n: usize,
    strategy: ColorStrategy,
    index_of: &impl Fn(&str) -> Option<usize>,
) -> Vec<Vector3<f32>> {
    for group in NAME_GROUPS {
        let member_cols: Option<Vec<usize>> =
            group.members.iter().map(|&m| index_of(m)).collect();
        let Some(cols) = member_cols else { continue };

        match group.kind {
            GroupKind::BaseColor => {
                // Integer-typed channels are 0-255; floats already 0-1.
                let scales: Vec<f32> = cols
                    .iter()
                    .map(|&c| {
                        if header.properties[c].0.is_integer() {
                            1.0 / 255.0
                        } else {
                            1.0
                        }
                    })
                    .collect();
                return (0..n)
                    .map(|i| {
                        Vector3::new(
                            columns[cols[0]][i] * scales[0],
                            columns[cols[1]][i] * scales[1],
                            columns[cols[2]][i] * scales[2],
                        )
                    })
                    .collect();
            }
            GroupKind::ShColor => {
                return (0..n)
                    .map(|i| {
                        Vector3::new(
                            strategy.activate(columns[cols[0]][i]),
                            strategy.activate(columns[cols[1]][i]),
                            strategy.activate(columns[cols[2]][i]),
                        )
                    })
                    .collect();
            }
            _ => continue,
        }
    }

    log::debug!("no color properties found, defaulting to mid-gray");
    vec![Vector3::new(0.5, 0.5, 0.5); n]
}

/// Pick `k` of `n` indices uniformly without replacement, sorted to keep
/// the original record order.
fn subsample_indices(n: usize, k: usize, seed: u64) -> Vec<usize> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut indices = rand::seq::index::sample(&mut rng, n, k).into_vec();
    indices.sort_unstable();
    indices
}

/// Apply one index selection to every array of the cloud at once.
fn apply_indices(cloud: SplatCloud, indices: &[usize]) -> SplatCloud {
    SplatCloud {
        positions: indices.iter().map(|&i| cloud.positions[i]).collect(),
        colors: indices.iter().map(|&i| cloud.colors[i]).collect(),
        attributes: cloud
            .attributes
            .iter()
            .map(|(name, attr)| (name.clone(), attr.retain_indices(indices)))
            .collect(),
    }
}

/// Save a position + color cloud to ASCII PLY (colors 0-1, written as
/// 0-255 uchar channels).
pub fn save_points_ply(
    positions: &[Vector3<f32>],
    colors: &[Vector3<f32>],
    path: &Path,
) -> Result<(), LoadError> {
    let mut file = File::create(path)?;

    writeln!(file, "ply")?;
    writeln!(file, "format ascii 1.0")?;
    writeln!(file, "element vertex {}", positions.len())?;
    writeln!(file, "property float x")?;
    writeln!(file, "property float y")?;
    writeln!(file, "property float z")?;
    writeln!(file, "property uchar red")?;
    writeln!(file, "property uchar green")?;
    writeln!(file, "property uchar blue")?;
    writeln!(file, "end_header")?;

    let gray = Vector3::new(0.5, 0.5, 0.5);
    for (i, p) in positions.iter().enumerate() {
        let c = colors.get(i).unwrap_or(&gray);
        writeln!(
            file,
            "{} {} {} {} {} {}",
            p.x,
            p.y,
            p.z,
            (c.x.clamp(0.0, 1.0) * 255.0).round() as u8,
            (c.y.clamp(0.0, 1.0) * 255.0).round() as u8,
            (c.z.clamp(0.0, 1.0) * 255.0).round() as u8,
        )?;
    }

    Ok(())
}
