use snafu::Snafu;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum StateError {
    #[snafu(display("id '{raw}' is invalid for {id_type}"))]
    InvalidId {
        stage: &'static str,
        id_type: &'static str,
        raw: String,
        source: uuid::Error,
    },
    #[snafu(display("drag payload carries none of the expected types: {available:?}"))]
    MissingDragData {
        stage: &'static str,
        available: Vec<String>,
    },
}

pub type StateResult<T> = Result<T, StateError>;
