use std::fmt;

/// The closed set of import warning kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum WarningKind {
    DurationParseError,
    TitleMatchError,
    ArgMergeError,
    AsyncSliceParseError,
    FlowSliceParseError,
    FlowSliceStartError,
    FlowSliceEndError,
    FlowSliceOrderingError,
    FlowSliceBindPointError,
    CounterParseError,
    ObjectParseError,
    ObjectSnapshotParseError,
    MemoryDumpParseError,
    MetadataParseError,
    StackFrameAndStackError,
    SampleImportError,
    InstantParseError,
    AnnotationWarning,
    ParseError,
}

impl WarningKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DurationParseError => "duration_parse_error",
            Self::TitleMatchError => "title_match_error",
            Self::ArgMergeError => "arg_merge_error",
            Self::AsyncSliceParseError => "async_slice_parse_error",
            Self::FlowSliceParseError => "flow_slice_parse_error",
            Self::FlowSliceStartError => "flow_slice_start_error",
            Self::FlowSliceEndError => "flow_slice_end_error",
            Self::FlowSliceOrderingError => "flow_slice_ordering_error",
            Self::FlowSliceBindPointError => "flow_slice_bind_point_error",
            Self::CounterParseError => "counter_parse_error",
            Self::ObjectParseError => "object_parse_error",
            Self::ObjectSnapshotParseError => "object_snapshot_parse_error",
            Self::MemoryDumpParseError => "memory_dump_parse_error",
            Self::MetadataParseError => "metadata_parse_error",
            Self::StackFrameAndStackError => "stack_frame_and_stack_error",
            Self::SampleImportError => "sample_import_error",
            Self::InstantParseError => "instant_parse_error",
            Self::AnnotationWarning => "annotation_warning",
            Self::ParseError => "parse_error",
        }
    }
}

impl fmt::Display for WarningKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One recorded import warning. Every emission is retained, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportWarning {
    pub kind: WarningKind,
    pub message: String,
}
