use crate::{
    Bearing, Coordinate, DecodeError, Fow, Frc, GridSize, Length, LineAttributes, Offset,
    Orientation, SideOfRoad,
};

/// The two attribute bytes shared by every location reference point, whose last bits carry a
/// different meaning (LFRCNP/offset flags, orientation/side) depending on the location type and
/// on whether the point is the last one.
#[derive(Debug, Clone, Copy)]
pub(crate) struct EncodedAttributes {
    pub(crate) line: LineAttributes,
    pub(crate) lfrcnp_or_flags: u8,
    pub(crate) orientation_or_side: u8,
}

impl EncodedAttributes {
    pub(crate) const fn lfrcnp(&self) -> Result<Frc, DecodeError> {
        Frc::try_from_byte(self.lfrcnp_or_flags)
    }

    pub(crate) const fn pos_offset_flag(&self) -> bool {
        self.lfrcnp_or_flags & 0b10 != 0
    }

    pub(crate) const fn neg_offset_flag(&self) -> bool {
        self.lfrcnp_or_flags & 0b01 != 0
    }

    pub(crate) const fn orientation(&self) -> Result<Orientation, DecodeError> {
        Orientation::try_from_byte(self.orientation_or_side)
    }

    pub(crate) const fn side(&self) -> Result<SideOfRoad, DecodeError> {
        SideOfRoad::try_from_byte(self.orientation_or_side)
    }
}

impl Frc {
    pub(crate) const fn try_from_byte(byte: u8) -> Result<Self, DecodeError> {
        match byte {
            0 => Ok(Self::Frc0),
            1 => Ok(Self::Frc1),
            2 => Ok(Self::Frc2),
            3 => Ok(Self::Frc3),
            4 => Ok(Self::Frc4),
            5 => Ok(Self::Frc5),
            6 => Ok(Self::Frc6),
            7 => Ok(Self::Frc7),
            _ => Err(DecodeError::InvalidFrc(byte)),
        }
    }
}

impl Fow {
    pub(crate) const fn try_from_byte(byte: u8) -> Result<Self, DecodeError> {
        match byte {
            0 => Ok(Self::Undefined),
            1 => Ok(Self::Motorway),
            2 => Ok(Self::MultipleCarriageway),
            3 => Ok(Self::SingleCarriageway),
            4 => Ok(Self::Roundabout),
            5 => Ok(Self::TrafficSquare),
            6 => Ok(Self::SlipRoad),
            7 => Ok(Self::Other),
            _ => Err(DecodeError::InvalidFow(byte)),
        }
    }
}

impl Coordinate {
    const RESOLUTION: usize = 24;
    const DECA_MICRO_DEG_FACTOR: f64 = 100000.0;

    pub(crate) fn new(lon: f64, lat: f64) -> Self {
        Self { lon, lat }
    }

    /// Returns degrees from a big-endian degrees representation in a 24-bit resolution.
    pub(crate) fn degrees_from_be_bytes(bytes: [u8; 3]) -> f64 {
        let is_negative = bytes[0] & 0x80 != 0;
        let sign = if is_negative { 0xFF } else { 0 };
        let degrees = i32::from_be_bytes([sign, bytes[0], bytes[1], bytes[2]]) as f64;
        ((degrees - signum(degrees) * 0.5) * 360.0) / (1 << Self::RESOLUTION) as f64
    }

    /// Returns degrees from a big-endian relative degrees representation in a 16-bit resolution.
    pub(crate) fn degrees_from_be_bytes_relative(bytes: [u8; 2], previous_degrees: f64) -> f64 {
        let degrees = i16::from_be_bytes(bytes) as f64;
        previous_degrees + degrees / Self::DECA_MICRO_DEG_FACTOR
    }
}

impl Length {
    /// This representation defines 256 intervals and each interval has a length of
    /// approximately 58.6 meters. Maximum length between two consecutive LR-points is limited
    /// by 15000m.
    const DISTANCE_PER_INTERVAL: f64 = 58.6;

    /// Returns the distance to next LR-point in meters from a byte.
    pub(crate) fn dnp_from_byte(byte: u8) -> Self {
        let meters = (byte as f64 + 0.5) * Self::DISTANCE_PER_INTERVAL;
        Self::from_meters(meters.round())
    }

    /// Returns the length of a radius in meters from big-endian slice of (up to 4) bytes.
    pub(crate) fn radius_from_be_bytes(bytes: &[u8]) -> Self {
        let mut radius = [0u8; 4];
        radius[4 - bytes.len()..].copy_from_slice(bytes);
        Self::from_meters(u32::from_be_bytes(radius) as f64)
    }
}

impl Bearing {
    /// The data format defines 32 sectors whereby each sector covers 11.25° of the circle.
    const BEAR_SECTOR: f64 = 11.25;

    pub(crate) fn from_byte(byte: u8) -> Self {
        let degrees = byte as f64 * Self::BEAR_SECTOR + Self::BEAR_SECTOR / 2.0;
        Self::from_degrees(degrees.round())
    }
}

impl Offset {
    /// The value is the relation of the offset length to the length of the path between the
    /// first two location reference points (last two for the negative offset), distributed
    /// equally over 256 buckets so that every bucket covers 0.390625% of the LRP length.
    pub(crate) fn from_byte(bucket: u8) -> Self {
        Self::from_range((bucket as f64 + 0.5) / 256.0)
    }
}

impl Orientation {
    pub(crate) const fn try_from_byte(byte: u8) -> Result<Self, DecodeError> {
        match byte {
            0 => Ok(Self::Unknown),
            1 => Ok(Self::Forward),
            2 => Ok(Self::Backward),
            3 => Ok(Self::Both),
            _ => Err(DecodeError::InvalidOrientation(byte)),
        }
    }
}

impl SideOfRoad {
    pub(crate) const fn try_from_byte(byte: u8) -> Result<Self, DecodeError> {
        match byte {
            0 => Ok(Self::OnRoadOrUnknown),
            1 => Ok(Self::Right),
            2 => Ok(Self::Left),
            3 => Ok(Self::Both),
            _ => Err(DecodeError::InvalidSideOfRoad(byte)),
        }
    }
}

impl GridSize {
    pub(crate) fn from_be_bytes(bytes: [u8; 4]) -> Self {
        let [c1, c2, r1, r2] = bytes;
        let columns = u16::from_be_bytes([c1, c2]);
        let rows = u16::from_be_bytes([r1, r2]);
        Self { columns, rows }
    }
}

const fn signum(value: f64) -> f64 {
    if value == 0.0 { 0.0 } else { value.signum() }
}
