use std::io::{Cursor, Read};

use base64::Engine;
use base64::prelude::BASE64_STANDARD;

use crate::binary::encoding::EncodedAttributes;
use crate::{
    Circle, ClosedLine, Coordinate, DecodeError, Grid, GridSize, Length, Line, LineAttributes,
    LocationReference, LocationType, Offset, PathAttributes, Point, Poi, PointAlongLine, Polygon,
    Rectangle,
};

/// Decodes an OpenLR Location Reference encoded in Base64 into its physical representation,
/// without resolving it against a map.
pub fn deserialize_base64_openlr(data: impl AsRef<[u8]>) -> Result<LocationReference, DecodeError> {
    let data = BASE64_STANDARD.decode(data).map_err(|_| DecodeError::InvalidBase64)?;
    deserialize_binary_openlr(&data)
}

/// Decodes an OpenLR Location Reference encoded in binary into its physical representation,
/// without resolving it against a map.
pub fn deserialize_binary_openlr(data: &[u8]) -> Result<LocationReference, DecodeError> {
    use LocationReference::*;

    let mut reader = OpenLrBinaryReader::new(data);

    match reader.read_header()? {
        LocationType::Line => Ok(Line(reader.read_line()?)),
        LocationType::GeoCoordinate => Ok(GeoCoordinate(reader.read_coordinate()?)),
        LocationType::PointAlongLine => Ok(PointAlongLine(reader.read_point_along_line()?)),
        LocationType::PoiWithAccessPoint => Ok(Poi(reader.read_poi()?)),
        LocationType::Circle => Ok(Circle(reader.read_circle()?)),
        LocationType::Rectangle => Ok(Rectangle(reader.read_rectangle()?)),
        LocationType::Grid => Ok(Grid(reader.read_grid()?)),
        LocationType::Polygon => Ok(Polygon(reader.read_polygon()?)),
        LocationType::ClosedLine => Ok(ClosedLine(reader.read_closed_line()?)),
    }
}

#[derive(Debug)]
struct OpenLrBinaryReader<'a> {
    cursor: Cursor<&'a [u8]>,
}

impl<'a> OpenLrBinaryReader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self {
            cursor: Cursor::new(data),
        }
    }

    fn len(&self) -> usize {
        self.cursor.get_ref().len()
    }

    fn read_header(&mut self) -> Result<LocationType, DecodeError> {
        let mut header = [0u8; 1];
        self.cursor.read_exact(&mut header)?;

        let version = header[0] & 0b111;
        if version != 3 {
            return Err(DecodeError::VersionNotSupported(version));
        }

        let location_type = (header[0] >> 3) & 0b1111;
        let location_type = match location_type {
            0 => LocationType::Circle,
            1 => LocationType::Line,
            2 => LocationType::Polygon,
            4 => LocationType::GeoCoordinate,
            5 if self.len() > 17 => LocationType::PoiWithAccessPoint,
            5 => LocationType::PointAlongLine,
            8 if self.len() > 13 => LocationType::Grid,
            8 => LocationType::Rectangle,
            11 => LocationType::ClosedLine,
            _ => return Err(DecodeError::InvalidHeader(header[0])),
        };

        Ok(location_type)
    }

    fn read_line(&mut self) -> Result<Line, DecodeError> {
        let relative_points_count = (self.len() - 9) / 7;
        let mut line = Line::with_capacity(1 + relative_points_count);

        let mut coordinate = self.read_coordinate()?;
        let mut attributes = self.read_attributes()?;

        for _ in 0..relative_points_count {
            let dnp = self.read_dnp()?;

            line.points.push(Point {
                coordinate,
                line: attributes.line,
                path: Some(PathAttributes {
                    lfrcnp: attributes.lfrcnp()?,
                    dnp,
                }),
            });

            coordinate = self.read_relative_coordinate(coordinate)?;
            attributes = self.read_attributes()?;
        }

        line.points.push(Point {
            coordinate,
            line: attributes.line,
            path: None,
        });

        let mut read_offset = |offset_flag| {
            if offset_flag {
                self.read_offset()
            } else {
                Ok(Offset::default())
            }
        };

        line.offsets.pos = read_offset(attributes.pos_offset_flag())?;
        line.offsets.neg = read_offset(attributes.neg_offset_flag())?;

        Ok(line)
    }

    fn read_closed_line(&mut self) -> Result<ClosedLine, DecodeError> {
        let relative_points_count = (self.len() - 12) / 7;
        let mut line = ClosedLine {
            points: Vec::with_capacity(1 + relative_points_count),
            ..Default::default()
        };

        let mut coordinate = self.read_coordinate()?;
        let attributes = self.read_attributes()?;
        let dnp = self.read_dnp()?;
        line.points.push(Point {
            coordinate,
            line: attributes.line,
            path: Some(PathAttributes {
                lfrcnp: attributes.lfrcnp()?,
                dnp,
            }),
        });

        for _ in 0..relative_points_count {
            coordinate = self.read_relative_coordinate(coordinate)?;
            let attributes = self.read_attributes()?;
            let dnp = self.read_dnp()?;
            line.points.push(Point {
                coordinate,
                line: attributes.line,
                path: Some(PathAttributes {
                    lfrcnp: attributes.lfrcnp()?,
                    dnp,
                }),
            });
        }

        let attributes = self.read_attributes()?;
        line.last_line = attributes.line;

        Ok(line)
    }

    fn read_point_along_line(&mut self) -> Result<PointAlongLine, DecodeError> {
        let coordinate = self.read_coordinate()?;
        let attributes = self.read_attributes()?;
        let dnp = self.read_dnp()?;
        let orientation = attributes.orientation()?;

        let point_1 = Point {
            coordinate,
            line: attributes.line,
            path: Some(PathAttributes {
                lfrcnp: attributes.lfrcnp()?,
                dnp,
            }),
        };

        let coordinate = self.read_relative_coordinate(coordinate)?;
        let attributes = self.read_attributes()?;
        let side = attributes.side()?;

        let point_2 = Point {
            coordinate,
            line: attributes.line,
            path: None,
        };

        let offset = if attributes.pos_offset_flag() {
            self.read_offset()?
        } else {
            Offset::default()
        };

        Ok(PointAlongLine {
            points: [point_1, point_2],
            offset,
            orientation,
            side,
        })
    }

    fn read_poi(&mut self) -> Result<Poi, DecodeError> {
        let point = self.read_point_along_line()?;
        let poi = self.read_relative_coordinate(point.points[0].coordinate)?;
        Ok(Poi { point, poi })
    }

    fn read_circle(&mut self) -> Result<Circle, DecodeError> {
        let center = self.read_coordinate()?;
        let radius = self.read_radius()?;
        Ok(Circle { center, radius })
    }

    fn read_rectangle(&mut self) -> Result<Rectangle, DecodeError> {
        let lower_left = self.read_coordinate()?;

        let upper_right = if self.len() > 11 {
            self.read_coordinate()?
        } else {
            self.read_relative_coordinate(lower_left)?
        };

        Ok(Rectangle {
            lower_left,
            upper_right,
        })
    }

    fn read_grid(&mut self) -> Result<Grid, DecodeError> {
        let lower_left = self.read_coordinate()?;

        let upper_right = if self.len() > 15 {
            self.read_coordinate()?
        } else {
            self.read_relative_coordinate(lower_left)?
        };

        let rect = Rectangle {
            lower_left,
            upper_right,
        };

        let size = self.read_grid_size()?;

        Ok(Grid { rect, size })
    }

    fn read_polygon(&mut self) -> Result<Polygon, DecodeError> {
        let relative_corners_count = (self.len() - 7) / 4;
        let mut polygon = Polygon {
            corners: Vec::with_capacity(1 + relative_corners_count),
        };

        let mut coordinate = self.read_coordinate()?;
        polygon.corners.push(coordinate);

        for _ in 0..relative_corners_count {
            coordinate = self.read_relative_coordinate(coordinate)?;
            polygon.corners.push(coordinate);
        }

        Ok(polygon)
    }

    fn read_coordinate(&mut self) -> Result<Coordinate, DecodeError> {
        let mut parse_coordinate = || -> Result<f64, DecodeError> {
            let mut c = [0u8; 3];
            self.cursor.read_exact(&mut c)?;
            Ok(Coordinate::degrees_from_be_bytes(c))
        };

        let lon = parse_coordinate()?;
        let lat = parse_coordinate()?;
        Ok(Coordinate::new(lon, lat))
    }

    fn read_relative_coordinate(&mut self, previous: Coordinate) -> Result<Coordinate, DecodeError> {
        let mut parse_coordinate = |previous| -> Result<f64, DecodeError> {
            let mut c = [0u8; 2];
            self.cursor.read_exact(&mut c)?;
            Ok(Coordinate::degrees_from_be_bytes_relative(c, previous))
        };

        let lon = parse_coordinate(previous.lon)?;
        let lat = parse_coordinate(previous.lat)?;
        Ok(Coordinate::new(lon, lat))
    }

    fn read_attributes(&mut self) -> Result<EncodedAttributes, DecodeError> {
        let mut attributes = [0u8; 2];
        self.cursor.read_exact(&mut attributes)?;

        let fow = crate::Fow::try_from_byte(attributes[0] & 0b111)?;
        let frc = crate::Frc::try_from_byte((attributes[0] >> 3) & 0b111)?;
        let orientation_or_side = (attributes[0] >> 6) & 0b11;
        let bearing = crate::Bearing::from_byte(attributes[1] & 0b11111);
        let lfrcnp_or_flags = (attributes[1] >> 5) & 0b111;

        Ok(EncodedAttributes {
            line: LineAttributes { frc, fow, bearing },
            lfrcnp_or_flags,
            orientation_or_side,
        })
    }

    fn read_dnp(&mut self) -> Result<Length, DecodeError> {
        let mut dnp = [0u8; 1];
        self.cursor.read_exact(&mut dnp)?;
        Ok(Length::dnp_from_byte(dnp[0]))
    }

    fn read_offset(&mut self) -> Result<Offset, DecodeError> {
        let mut offset = [0u8; 1];
        self.cursor.read_exact(&mut offset)?;
        Ok(Offset::from_byte(offset[0]))
    }

    fn read_radius(&mut self) -> Result<Length, DecodeError> {
        let mut radius = [0u8; 4];
        let length = self.cursor.read(&mut radius)?;
        Ok(Length::radius_from_be_bytes(&radius[..length]))
    }

    fn read_grid_size(&mut self) -> Result<GridSize, DecodeError> {
        let mut size = [0u8; 4];
        self.cursor.read_exact(&mut size)?;
        Ok(GridSize::from_be_bytes(size))
    }
}
