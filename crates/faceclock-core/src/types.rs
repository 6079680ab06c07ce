use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Number of points in the 68-point facial landmark scheme.
pub const LANDMARK_COUNT: usize = 68;

/// A 2-D landmark position in frame pixel coordinates.
pub type Point = (f32, f32);

/// Face embedding vector (128-dimensional for the dlib ResNet model).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Embedding {
    pub values: Vec<f32>,
}

impl Embedding {
    pub fn new(values: Vec<f32>) -> Self {
        Self { values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Compute cosine similarity between two embeddings.
    ///
    /// Returns a value in [-1, 1]. Higher = more similar. A zero-norm vector
    /// has similarity 0 with everything. Only the shared prefix is compared
    /// when lengths differ; callers that care check lengths first.
    pub fn similarity(&self, other: &Embedding) -> f32 {
        let mut dot = 0.0f64;
        let mut norm_a = 0.0f64;
        let mut norm_b = 0.0f64;

        for (&a, &b) in self.values.iter().zip(other.values.iter()) {
            let (a, b) = (a as f64, b as f64);
            dot += a * b;
            norm_a += a * a;
            norm_b += b * b;
        }

        let denom = (norm_a * norm_b).sqrt();
        if denom > 0.0 {
            (dot / denom).clamp(-1.0, 1.0) as f32
        } else {
            0.0
        }
    }

    /// Cosine distance, `1 - similarity`. 0 = same direction, 2 = opposite.
    pub fn cosine_distance(&self, other: &Embedding) -> f32 {
        1.0 - self.similarity(other)
    }

    /// True when every component is finite.
    pub fn is_finite(&self) -> bool {
        self.values.iter().all(|v| v.is_finite())
    }
}

impl From<Vec<f32>> for Embedding {
    fn from(values: Vec<f32>) -> Self {
        Self { values }
    }
}

#[derive(Error, Debug, PartialEq)]
#[error("expected 68 landmarks, got {0}")]
pub struct LandmarkCountError(pub usize);

/// The 68 ordered landmark points of one detected face.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Point>", into = "Vec<Point>")]
pub struct Landmarks(Vec<Point>);

impl Landmarks {
    pub fn points(&self) -> &[Point] {
        &self.0
    }

    /// Copy out six consecutive points starting at `start`.
    pub(crate) fn eye(&self, start: usize) -> [Point; 6] {
        let mut eye = [(0.0, 0.0); 6];
        eye.copy_from_slice(&self.0[start..start + 6]);
        eye
    }
}

impl TryFrom<Vec<Point>> for Landmarks {
    type Error = LandmarkCountError;

    fn try_from(points: Vec<Point>) -> Result<Self, Self::Error> {
        if points.len() != LANDMARK_COUNT {
            return Err(LandmarkCountError(points.len()));
        }
        Ok(Self(points))
    }
}

impl From<Landmarks> for Vec<Point> {
    fn from(landmarks: Landmarks) -> Self {
        landmarks.0
    }
}

/// One observed face: what the external model produced for a single frame.
/// Never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaceSample {
    pub embedding: Embedding,
    pub landmarks: Landmarks,
}

/// An enrolled user and their reference embedding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrolledUser {
    pub name: String,
    pub embedding: Embedding,
}

/// Name → reference embedding mapping that remembers insertion order.
///
/// Re-inserting an existing name replaces its embedding in place, so the
/// iteration order is the order in which names were first enrolled.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KnownFaces {
    faces: Vec<EnrolledUser>,
}

impl KnownFaces {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite. Returns the previous embedding, if any.
    pub fn insert(&mut self, name: &str, embedding: Embedding) -> Option<Embedding> {
        match self.faces.iter_mut().find(|f| f.name == name) {
            Some(existing) => Some(std::mem::replace(&mut existing.embedding, embedding)),
            None => {
                self.faces.push(EnrolledUser {
                    name: name.to_string(),
                    embedding,
                });
                None
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&Embedding> {
        self.faces
            .iter()
            .find(|f| f.name == name)
            .map(|f| &f.embedding)
    }

    pub fn remove(&mut self, name: &str) -> Option<Embedding> {
        let idx = self.faces.iter().position(|f| f.name == name)?;
        Some(self.faces.remove(idx).embedding)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.faces.iter().map(|f| f.name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &EnrolledUser> {
        self.faces.iter()
    }

    pub fn len(&self) -> usize {
        self.faces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.faces.is_empty()
    }
}

impl FromIterator<EnrolledUser> for KnownFaces {
    fn from_iter<I: IntoIterator<Item = EnrolledUser>>(iter: I) -> Self {
        let mut faces = KnownFaces::new();
        for user in iter {
            faces.insert(&user.name, user.embedding);
        }
        faces
    }
}
