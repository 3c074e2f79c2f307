use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;

use tracing::info;

use crate::error::{KnnError, Result};
use crate::{Label, IMAGE_WIDTH, NUM_LABELS, NUM_PIXELS};

// A grid of pixel intensities (0-255), stored row-major
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Image {
    width: usize,
    height: usize,
    pixels: Box<[u8]>,
}

impl Image {
    pub fn new(width: usize, height: usize, pixels: Vec<u8>) -> Result<Self> {
        let area = width.checked_mul(height).ok_or_else(|| {
            KnnError::MalformedInput(format!("a {}x{} image is too large", width, height))
        })?;
        if pixels.len() != area {
            return Err(KnnError::MalformedInput(format!(
                "expected {} pixels for a {}x{} image, found {}",
                area,
                width,
                height,
                pixels.len()
            )));
        }
        Ok(Image {
            width,
            height,
            pixels: pixels.into_boxed_slice(),
        })
    }

    // An IMAGE_WIDTH x IMAGE_WIDTH image, the only shape the file format holds
    pub fn square(pixels: Vec<u8>) -> Result<Self> {
        Self::new(IMAGE_WIDTH, IMAGE_WIDTH, pixels)
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }
}

/// Labelled images, held as parallel arrays.
///
/// A dataset is read-only once built: workers classify against it through
/// shared references.
///
/// The binary layout read by [`Dataset::read_from`] and written by
/// [`Dataset::write_to`] is:
///
/// - 4 bytes: `N`, the number of items, as a native-endian `i32`
/// - then `N` times: 1 label byte followed by `IMAGE_WIDTH * IMAGE_WIDTH`
///   row-major pixel bytes
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Dataset {
    labels: Vec<Label>,
    images: Vec<Image>,
}

impl Dataset {
    pub fn new(labels: Vec<Label>, images: Vec<Image>) -> Result<Self> {
        if labels.len() != images.len() {
            return Err(KnnError::MalformedInput(format!(
                "{} labels for {} images",
                labels.len(),
                images.len()
            )));
        }
        if let Some(&label) = labels.iter().find(|&&label| label as usize >= NUM_LABELS) {
            return Err(KnnError::MalformedInput(format!(
                "label {} is outside 0..{}",
                label, NUM_LABELS
            )));
        }
        Ok(Dataset { labels, images })
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn labels(&self) -> &[Label] {
        &self.labels
    }

    pub fn images(&self) -> &[Image] {
        &self.images
    }

    pub fn label(&self, index: usize) -> Label {
        self.labels[index]
    }

    pub fn image(&self, index: usize) -> &Image {
        &self.images[index]
    }

    pub fn iter(&self) -> impl ExactSizeIterator<Item = (Label, &Image)> + '_ {
        self.labels.iter().copied().zip(self.images.iter())
    }

    /// Load a dataset file. Any short read fails with [`KnnError::MalformedInput`].
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| KnnError::io(path, e))?;
        let dataset = Self::read_from(BufReader::new(file))?;
        info!(path = %path.display(), items = dataset.len(), "loaded dataset");
        Ok(dataset)
    }

    pub fn read_from(mut reader: impl Read) -> Result<Self> {
        let mut count = [0_u8; 4];
        read_field(&mut reader, &mut count, || "the item count".to_owned())?;
        let count = i32::from_ne_bytes(count);
        let count = usize::try_from(count)
            .map_err(|_| KnnError::MalformedInput(format!("negative item count {}", count)))?;

        // The count comes from the file, so don't trust it for preallocation
        let mut labels = Vec::new();
        let mut images = Vec::new();
        for i in 0..count {
            let mut label = [0_u8; 1];
            read_field(&mut reader, &mut label, || format!("the label of item {}", i))?;
            let mut pixels = vec![0_u8; NUM_PIXELS];
            read_field(&mut reader, &mut pixels, || format!("the pixels of image {}", i))?;
            labels.push(label[0]);
            images.push(Image::square(pixels)?);
        }
        Self::new(labels, images)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let file = File::create(path).map_err(|e| KnnError::io(path, e))?;
        let mut writer = BufWriter::new(file);
        self.write_to(&mut writer)
            .and_then(|()| writer.flush())
            .map_err(|e| KnnError::io(path, e))
    }

    pub fn write_to(&self, writer: &mut impl Write) -> io::Result<()> {
        let count = i32::try_from(self.len()).map_err(|_| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                "dataset has too many items for the file format",
            )
        })?;
        writer.write_all(&count.to_ne_bytes())?;
        for (label, image) in self.iter() {
            if image.pixels().len() != NUM_PIXELS {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("only {}x{} images can be written", IMAGE_WIDTH, IMAGE_WIDTH),
                ));
            }
            writer.write_all(&[label])?;
            writer.write_all(image.pixels())?;
        }
        Ok(())
    }

    // Load MNIST images from a csv file.
    // The expected format is:
    // - No headers
    // - One image per row
    // - Each row starts with the class label 0-9
    // - The rest of the row consists of 28x28 pixel values, 0-255
    pub fn from_csv(reader: impl Read) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .from_reader(reader);

        let mut labels = Vec::new();
        let mut images = Vec::new();
        for (row, record) in reader.records().enumerate() {
            let record = record?;
            let parse = |field: &str, what: &str| {
                field.trim().parse::<u8>().map_err(|_| {
                    KnnError::MalformedInput(format!("row {}: bad {} {:?}", row, what, field))
                })
            };
            let label = parse(record.get(0).unwrap_or_default(), "label")?;
            let pixels = record
                .iter()
                .skip(1) // Skip the label
                .map(|field| parse(field, "pixel"))
                .collect::<Result<Vec<u8>>>()?;
            labels.push(label);
            images.push(Image::square(pixels)?);
        }
        Self::new(labels, images)
    }
}

// read_exact loops over short reads; running out of bytes means the input is truncated
fn read_field(reader: &mut impl Read, buf: &mut [u8], what: impl FnOnce() -> String) -> Result<()> {
    reader.read_exact(buf).map_err(|e| match e.kind() {
        io::ErrorKind::UnexpectedEof => {
            KnnError::MalformedInput(format!("stream ended while reading {}", what()))
        }
        _ => KnnError::Stream(e),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filled(value: u8) -> Image {
        Image::square(vec![value; NUM_PIXELS]).unwrap()
    }

    fn encode(dataset: &Dataset) -> Vec<u8> {
        let mut bytes = Vec::new();
        dataset.write_to(&mut bytes).unwrap();
        bytes
    }

    #[test]
    fn empty_stream_of_zero_items_loads() {
        let bytes = 0_i32.to_ne_bytes();
        let dataset = Dataset::read_from(&bytes[..]).unwrap();
        assert!(dataset.is_empty());
    }

    #[test]
    fn layout_is_count_then_label_and_pixels() {
        let dataset = Dataset::new(vec![4, 9], vec![filled(1), filled(2)]).unwrap();
        let bytes = encode(&dataset);
        assert_eq!(bytes.len(), 4 + 2 * (1 + NUM_PIXELS));
        assert_eq!(&bytes[..4], &2_i32.to_ne_bytes());
        assert_eq!(bytes[4], 4);
        assert_eq!(bytes[5], 1);
        assert_eq!(bytes[5 + NUM_PIXELS], 9);

        let loaded = Dataset::read_from(&bytes[..]).unwrap();
        assert_eq!(loaded.labels(), &[4, 9]);
        assert_eq!(loaded.image(1), &filled(2));
        assert_eq!(loaded.image(0).width(), IMAGE_WIDTH);
        assert_eq!(loaded.image(0).height(), IMAGE_WIDTH);
    }

    #[test]
    fn missing_count_is_malformed() {
        let err = Dataset::read_from(&[1_u8, 0][..]).unwrap_err();
        assert!(matches!(err, KnnError::MalformedInput(_)));
    }

    #[test]
    fn truncated_pixels_are_malformed() {
        let dataset = Dataset::new(vec![3], vec![filled(7)]).unwrap();
        let bytes = encode(&dataset);
        let err = Dataset::read_from(&bytes[..bytes.len() - 1]).unwrap_err();
        assert!(matches!(err, KnnError::MalformedInput(msg) if msg.contains("pixels of image 0")));
    }

    #[test]
    fn missing_label_is_malformed() {
        let bytes = 1_i32.to_ne_bytes();
        let err = Dataset::read_from(&bytes[..]).unwrap_err();
        assert!(matches!(err, KnnError::MalformedInput(msg) if msg.contains("label of item 0")));
    }

    #[test]
    fn negative_count_is_malformed() {
        let bytes = (-3_i32).to_ne_bytes();
        assert!(matches!(
            Dataset::read_from(&bytes[..]),
            Err(KnnError::MalformedInput(_))
        ));
    }

    #[test]
    fn out_of_range_label_is_rejected() {
        let mut bytes = 1_i32.to_ne_bytes().to_vec();
        bytes.push(NUM_LABELS as u8);
        bytes.extend(std::iter::repeat(0).take(NUM_PIXELS));
        assert!(matches!(
            Dataset::read_from(&bytes[..]),
            Err(KnnError::MalformedInput(_))
        ));
    }

    #[test]
    fn mismatched_parallel_arrays_are_rejected() {
        assert!(Dataset::new(vec![1, 2], vec![filled(0)]).is_err());
    }

    #[test]
    fn wrong_pixel_count_is_rejected() {
        assert!(Image::square(vec![0; NUM_PIXELS - 1]).is_err());
        assert!(Image::new(2, 3, vec![0; 6]).is_ok());
    }

    #[test]
    fn oversized_dimensions_are_malformed() {
        assert!(matches!(
            Image::new(usize::MAX, 2, vec![0; 4]),
            Err(KnnError::MalformedInput(_))
        ));
    }

    #[test]
    fn save_then_load_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("train.bin");
        let dataset = Dataset::new(vec![0, 5, 8], vec![filled(0), filled(50), filled(255)]).unwrap();
        dataset.save(&path).unwrap();
        assert_eq!(Dataset::load(&path).unwrap(), dataset);
    }

    #[test]
    fn missing_file_reports_the_path() {
        let dir = tempfile::tempdir().unwrap();
        let err = Dataset::load(dir.path().join("nope.bin")).unwrap_err();
        assert!(matches!(err, KnnError::Io { .. }));
    }

    #[test]
    fn csv_rows_become_images() {
        let pixels = vec!["17"; NUM_PIXELS].join(",");
        let csv = format!("3,{}\n8,{}\n", pixels, pixels);
        let dataset = Dataset::from_csv(csv.as_bytes()).unwrap();
        assert_eq!(dataset.labels(), &[3, 8]);
        assert_eq!(dataset.image(0), &filled(17));
    }

    #[test]
    fn csv_with_bad_pixel_is_malformed() {
        let mut fields = vec!["0"; NUM_PIXELS];
        fields[10] = "300";
        let csv = format!("1,{}\n", fields.join(","));
        assert!(matches!(
            Dataset::from_csv(csv.as_bytes()),
            Err(KnnError::MalformedInput(_))
        ));
    }
}
