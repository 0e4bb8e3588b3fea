use anyhow::Result;
use dlis::process::session::{Session, SessionStats};
use dlis::structs::frame::{FrameLayout, FrameView};
use dlis::structs::label::StorageUnitLabel;
use dlis::structs::model::{Model, ObjectId, SetId};
use dlis::structs::value::ObjectName;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use serde::Serialize;
use serde_yaml_ng::{Mapping, Value as YamlValue};

use super::command::{Cli, InfoArgs};
use crate::input::InputReader;

pub fn cmd_info(args: &InfoArgs, cli: &Cli, multi: Option<&MultiProgress>) -> Result<()> {
    log::info!("Analyzing DLIS file: {}", args.input.display());

    let input = InputReader::new(&args.input)?;
    if input.is_pipe() {
        log::debug!("Reading DLIS stream from stdin");
    }
    let total_bytes = input.size();
    let mut session = Session::new(cli.parse_options())?;
    let mut reader = input.open(&mut session)?;

    let pb = match multi {
        Some(multi) => {
            let pb = multi.add(ProgressBar::new_spinner());
            pb.set_style(ProgressStyle::with_template("{spinner:.green} {msg}")?);
            pb.enable_steady_tick(std::time::Duration::from_millis(100));
            pb.set_message("Analyzing records...");
            Some(pb)
        }
        None => None,
    };

    let mut frame_count = 0u64;
    let mut count_frames = |_: &ObjectName, _: &FrameView<'_>| {
        frame_count += 1;
        if frame_count.is_multiple_of(1000) {
            if let Some(ref pb) = pb {
                pb.set_message(format!("Analyzing records...      {frame_count} frames"));
            }
        }
    };
    let result = session.decode(&mut reader, &mut count_frames);

    if let Some(ref pb) = pb {
        pb.finish_and_clear();
    }
    result?;

    let summary = FileSummary::new(&session, total_bytes, args.objects);
    print!("{}", serde_yaml_ng::to_string(&summary)?);

    Ok(())
}

#[derive(Serialize)]
struct FileSummary {
    storage_unit: LabelSummary,
    logical_files: Vec<LogicalFileSummary>,
    frame_types: Vec<FrameSummary>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    unresolved_frame_types: Vec<UnresolvedSummary>,
    statistics: StatsSummary,
}

impl FileSummary {
    fn new(session: &Session, total_bytes: Option<u64>, objects: bool) -> Self {
        Self {
            storage_unit: session
                .storage_unit_label()
                .map(LabelSummary::from)
                .unwrap_or_default(),
            logical_files: logical_files(session.model(), objects),
            frame_types: session.frame_layouts().map(FrameSummary::from).collect(),
            unresolved_frame_types: session
                .unresolved_frames()
                .map(|(name, skipped_records)| UnresolvedSummary {
                    name: name.to_string(),
                    skipped_records,
                })
                .collect(),
            statistics: StatsSummary::new(session.stats(), total_bytes),
        }
    }
}

#[derive(Serialize, Default)]
struct LabelSummary {
    sequence_number: String,
    version: String,
    structure: String,
    max_record_length: String,
    storage_set_id: String,
}

impl From<&StorageUnitLabel> for LabelSummary {
    fn from(label: &StorageUnitLabel) -> Self {
        Self {
            sequence_number: label.sequence_number.clone(),
            version: label.version.clone(),
            structure: label.structure.clone(),
            max_record_length: label.max_record_length.clone(),
            storage_set_id: label.storage_set_id.clone(),
        }
    }
}

#[derive(Serialize)]
struct LogicalFileSummary {
    #[serde(skip_serializing_if = "Mapping::is_empty")]
    header: Mapping,
    sets: Vec<SetSummary>,
}

#[derive(Serialize)]
struct SetSummary {
    #[serde(rename = "type")]
    set_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    object_count: usize,
    #[serde(skip_serializing_if = "Mapping::is_empty")]
    objects: Mapping,
}

#[derive(Serialize)]
struct FrameSummary {
    name: String,
    bytes_per_frame: usize,
    channels: Vec<String>,
}

impl From<&FrameLayout> for FrameSummary {
    fn from(layout: &FrameLayout) -> Self {
        Self {
            name: layout.key.to_string(),
            bytes_per_frame: layout.len,
            channels: layout
                .channels
                .iter()
                .map(|c| format!("{} {} x{}", c.name, c.code, c.dimension))
                .collect(),
        }
    }
}

#[derive(Serialize)]
struct UnresolvedSummary {
    name: String,
    skipped_records: usize,
}

#[derive(Serialize)]
struct StatsSummary {
    #[serde(skip_serializing_if = "Option::is_none")]
    bytes: Option<u64>,
    visible_records: usize,
    logical_records: usize,
    explicit_records: usize,
    indirect_records: usize,
    encrypted_records: usize,
    skipped_records: usize,
    frames: u64,
}

impl StatsSummary {
    fn new(stats: SessionStats, bytes: Option<u64>) -> Self {
        Self {
            bytes,
            visible_records: stats.visible_records,
            logical_records: stats.logical_records,
            explicit_records: stats.explicit_records,
            indirect_records: stats.indirect_records,
            encrypted_records: stats.encrypted_records,
            skipped_records: stats.skipped_records + stats.skipped_frame_records,
            frames: stats.frames,
        }
    }
}

/// Groups sets by logical file. Sets seen before the first file header
/// form a logical file of their own.
fn logical_files(model: &Model, objects: bool) -> Vec<LogicalFileSummary> {
    let mut files = Vec::new();
    let mut orphans = Vec::new();

    for id in model.top_level() {
        if model.set(id).is_file_header() {
            files.push(LogicalFileSummary {
                header: model
                    .set(id)
                    .objects
                    .first()
                    .map(|&object| attributes(model, object))
                    .unwrap_or_default(),
                sets: model
                    .children(id)
                    .map(|set| set_summary(model, set, objects))
                    .collect(),
            });
        } else {
            orphans.push(set_summary(model, id, objects));
        }
    }

    if !orphans.is_empty() {
        files.insert(
            0,
            LogicalFileSummary {
                header: Mapping::new(),
                sets: orphans,
            },
        );
    }

    files
}

fn set_summary(model: &Model, id: SetId, objects: bool) -> SetSummary {
    let set = model.set(id);
    let mut summary = SetSummary {
        set_type: set.set_type.clone(),
        name: set.name.clone(),
        object_count: set.objects.len(),
        objects: Mapping::new(),
    };

    if objects {
        for &object in &set.objects {
            summary.objects.insert(
                YamlValue::String(model.object(object).name.to_string()),
                YamlValue::Mapping(attributes(model, object)),
            );
        }
    }

    summary
}

fn attributes(model: &Model, object: ObjectId) -> Mapping {
    let mut fields = Mapping::new();
    for &attribute in &model.object(object).attributes {
        let attr = model.attribute(attribute);
        if attr.absent {
            continue;
        }
        fields.insert(
            YamlValue::String(attr.label.clone()),
            YamlValue::String(model.attribute_string(attribute)),
        );
    }
    fields
}
