use crate::error::PaintError;

/// Image size in pixels
///
/// # Examples
///
/// ```
/// use painting_fusion::ImageSize;
///
/// let size = ImageSize { width: 10, height: 20 };
/// assert_eq!(size.width, 10);
/// assert_eq!(size.height, 20);
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ImageSize {
    /// Width of the image in pixels
    pub width: usize,
    /// Height of the image in pixels
    pub height: usize,
}

impl ImageSize {
    /// Number of pixels.
    pub fn area(&self) -> usize {
        self.width * self.height
    }

    /// Whether either dimension is zero.
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

impl std::fmt::Display for ImageSize {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(
            f,
            "ImageSize {{ width: {}, height: {} }}",
            self.width, self.height
        )
    }
}

impl From<[usize; 2]> for ImageSize {
    fn from(size: [usize; 2]) -> Self {
        ImageSize {
            width: size[0],
            height: size[1],
        }
    }
}

/// An interleaved 8-bit camera image, the input of the segmentation model.
#[derive(Clone, Debug, PartialEq)]
pub struct CameraImage {
    size: ImageSize,
    channels: usize,
    data: Vec<u8>,
}

impl CameraImage {
    /// Create a new image from interleaved (H, W, C) pixel data.
    ///
    /// # Errors
    ///
    /// Fails if the size is empty or the data length is not `width * height * channels`.
    pub fn new(size: ImageSize, channels: usize, data: Vec<u8>) -> Result<Self, PaintError> {
        if size.is_empty() || channels == 0 {
            return Err(PaintError::EmptyImage);
        }
        let expected = size.area() * channels;
        if data.len() != expected {
            return Err(PaintError::InvalidDataLength(data.len(), expected));
        }
        Ok(Self {
            size,
            channels,
            data,
        })
    }

    /// The image size in pixels.
    pub fn size(&self) -> ImageSize {
        self.size
    }

    /// Number of interleaved channels.
    pub fn num_channels(&self) -> usize {
        self.channels
    }

    /// The raw pixel data.
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }
}

#[derive(Clone, Debug, PartialEq)]
enum MaskData {
    Labels(Vec<u8>),
    Scores { num_classes: usize, values: Vec<f32> },
}

/// A dense per-pixel semantic segmentation.
///
/// Holds either one class id per pixel or one score vector per pixel (row-major,
/// classes interleaved). Read-only once built.
#[derive(Clone, Debug, PartialEq)]
pub struct SemanticMask {
    size: ImageSize,
    data: MaskData,
}

impl SemanticMask {
    /// Create a mask of hard class ids.
    ///
    /// # Arguments
    ///
    /// * `size` - The mask resolution.
    /// * `labels` - One class id per pixel, row-major.
    pub fn from_labels(size: ImageSize, labels: Vec<u8>) -> Result<Self, PaintError> {
        if size.is_empty() {
            return Err(PaintError::EmptyImage);
        }
        if labels.len() != size.area() {
            return Err(PaintError::InvalidDataLength(labels.len(), size.area()));
        }
        Ok(Self {
            size,
            data: MaskData::Labels(labels),
        })
    }

    /// Create a mask filled with a single class.
    pub fn from_size_val(size: ImageSize, label: u8) -> Result<Self, PaintError> {
        Self::from_labels(size, vec![label; size.area()])
    }

    /// Create a mask of per-class scores.
    ///
    /// # Arguments
    ///
    /// * `size` - The mask resolution.
    /// * `num_classes` - Number of scores per pixel.
    /// * `scores` - `num_classes` scores per pixel, row-major with classes interleaved.
    pub fn from_scores(
        size: ImageSize,
        num_classes: usize,
        scores: Vec<f32>,
    ) -> Result<Self, PaintError> {
        if size.is_empty() {
            return Err(PaintError::EmptyImage);
        }
        if num_classes == 0 || num_classes > 256 {
            return Err(PaintError::InvalidNumClasses(num_classes));
        }
        let expected = size.area() * num_classes;
        if scores.len() != expected {
            return Err(PaintError::InvalidDataLength(scores.len(), expected));
        }
        Ok(Self {
            size,
            data: MaskData::Scores {
                num_classes,
                values: scores,
            },
        })
    }

    /// The mask size in pixels.
    pub fn size(&self) -> ImageSize {
        self.size
    }

    /// Width of the mask in pixels.
    pub fn width(&self) -> usize {
        self.size.width
    }

    /// Height of the mask in pixels.
    pub fn height(&self) -> usize {
        self.size.height
    }

    /// Number of classes if the mask carries scores.
    pub fn num_classes(&self) -> Option<usize> {
        match &self.data {
            MaskData::Labels(_) => None,
            MaskData::Scores { num_classes, .. } => Some(*num_classes),
        }
    }

    /// The class id at `(col, row)`; the highest-scoring class for a score mask.
    ///
    /// PRECONDITION: `col < width` and `row < height`.
    pub fn label(&self, col: usize, row: usize) -> u8 {
        let idx = row * self.size.width + col;
        match &self.data {
            MaskData::Labels(labels) => labels[idx],
            MaskData::Scores {
                num_classes,
                values,
            } => argmax(&values[idx * num_classes..(idx + 1) * num_classes]),
        }
    }

    /// The score vector at `(col, row)`, if the mask carries scores.
    ///
    /// PRECONDITION: `col < width` and `row < height`.
    pub fn scores(&self, col: usize, row: usize) -> Option<&[f32]> {
        let idx = row * self.size.width + col;
        match &self.data {
            MaskData::Labels(_) => None,
            MaskData::Scores {
                num_classes,
                values,
            } => Some(&values[idx * num_classes..(idx + 1) * num_classes]),
        }
    }
}

/// Index of the largest value; the first one on ties.
fn argmax(values: &[f32]) -> u8 {
    let mut best = 0;
    for (i, v) in values.iter().enumerate() {
        if *v > values[best] {
            best = i;
        }
    }
    best as u8
}
