use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::{DomainError, DomainResult};

/// 统一的时间戳类型。
pub type Timestamp = DateTime<Utc>;

/// 身份唯一标识（外部用户目录的主键）。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IdentityId(pub Uuid);

impl IdentityId {
    pub fn new(id: Uuid) -> Self {
        Self(id)
    }
}

impl fmt::Display for IdentityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for IdentityId {
    fn from(value: Uuid) -> Self {
        Self(value)
    }
}

impl From<IdentityId> for Uuid {
    fn from(value: IdentityId) -> Self {
        value.0
    }
}

/// 聊天唯一标识。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChatId(pub Uuid);

impl ChatId {
    pub fn new(id: Uuid) -> Self {
        Self(id)
    }
}

impl fmt::Display for ChatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for ChatId {
    fn from(value: Uuid) -> Self {
        Self(value)
    }
}

impl From<ChatId> for Uuid {
    fn from(value: ChatId) -> Self {
        value.0
    }
}

/// 消息唯一标识。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(pub Uuid);

impl MessageId {
    pub fn new(id: Uuid) -> Self {
        Self(id)
    }

    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for MessageId {
    fn from(value: Uuid) -> Self {
        Self(value)
    }
}

impl From<MessageId> for Uuid {
    fn from(value: MessageId) -> Self {
        value.0
    }
}

/// 警报唯一标识。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AlertId(pub Uuid);

impl AlertId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for AlertId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 单个传输会话的唯一标识。
///
/// 同一身份可以持有多个连接（多设备），ConnectionId 区分它们。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConnectionId(pub Uuid);

impl ConnectionId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// WGS84 坐标。
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

/// 每纬度的近似米数，用于把半径换算成网格跨度。
const METERS_PER_DEGREE_LAT: f64 = 111_320.0;

/// 粗粒度的地理分桶键。
///
/// 把经纬度映射到固定大小（十进制度）的网格单元，使得位置订阅
/// 可以落到有限个稳定的主题上，而不是每次事件都做半径查询。
/// 半径覆盖是近似的：覆盖包含该半径的网格块。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GeoCell {
    pub lat_idx: i32,
    pub lon_idx: i32,
}

impl GeoCell {
    /// 坐标所在的网格单元。
    pub fn containing(coordinates: Coordinates, cell_size_deg: f64) -> Self {
        Self {
            lat_idx: (coordinates.latitude / cell_size_deg).floor() as i32,
            lon_idx: (coordinates.longitude / cell_size_deg).floor() as i32,
        }
    }

    /// 校验外部提供的半径在允许范围内。
    ///
    /// 覆盖的网格单元数随半径的平方增长，所以任何来自客户端或
    /// 协作方负载的半径必须先过这道门再调用 [`GeoCell::covering`]。
    pub fn validate_radius(radius_m: f64, max_radius_m: f64) -> DomainResult<()> {
        if !radius_m.is_finite() || radius_m <= 0.0 {
            return Err(DomainError::invalid_argument(
                "radius_m",
                "radius must be a positive number of meters",
            ));
        }
        if radius_m > max_radius_m {
            return Err(DomainError::invalid_argument(
                "radius_m",
                format!("radius exceeds the {max_radius_m} m limit"),
            ));
        }
        Ok(())
    }

    /// 覆盖以 `coordinates` 为圆心、`radius_m` 为半径的所有网格单元。
    pub fn covering(coordinates: Coordinates, radius_m: f64, cell_size_deg: f64) -> Vec<Self> {
        let lat_span_deg = radius_m / METERS_PER_DEGREE_LAT;
        // 经度跨度随纬度收缩；靠近极点时退化为整圈也可接受
        let lat_cos = coordinates.latitude.to_radians().cos().abs().max(0.01);
        let lon_span_deg = radius_m / (METERS_PER_DEGREE_LAT * lat_cos);

        let center = Self::containing(coordinates, cell_size_deg);
        let lat_cells = (lat_span_deg / cell_size_deg).ceil() as i32;
        let lon_cells = (lon_span_deg / cell_size_deg).ceil() as i32;

        let mut cells = Vec::new();
        for dlat in -lat_cells..=lat_cells {
            for dlon in -lon_cells..=lon_cells {
                cells.push(Self {
                    lat_idx: center.lat_idx + dlat,
                    lon_idx: center.lon_idx + dlon,
                });
            }
        }
        cells
    }
}

impl fmt::Display for GeoCell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.lat_idx, self.lon_idx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn containing_cell_is_stable() {
        let a = Coordinates {
            latitude: 31.2304,
            longitude: 121.4737,
        };
        let b = Coordinates {
            latitude: 31.2310,
            longitude: 121.4740,
        };
        // 相邻坐标应落入同一个 0.05 度网格
        assert_eq!(GeoCell::containing(a, 0.05), GeoCell::containing(b, 0.05));
    }

    #[test]
    fn covering_includes_center_cell() {
        let center = Coordinates {
            latitude: 31.23,
            longitude: 121.47,
        };
        let cells = GeoCell::covering(center, 2_000.0, 0.05);
        assert!(cells.contains(&GeoCell::containing(center, 0.05)));
    }

    #[test]
    fn covering_grows_with_radius() {
        let center = Coordinates {
            latitude: 31.23,
            longitude: 121.47,
        };
        let small = GeoCell::covering(center, 500.0, 0.05);
        let large = GeoCell::covering(center, 20_000.0, 0.05);
        assert!(large.len() > small.len());
    }

    #[test]
    fn radius_validation_rejects_out_of_range_values() {
        const MAX: f64 = 50_000.0;
        for radius in [0.0, -250.0, f64::NAN, f64::INFINITY, MAX + 1.0, 10_000_000.0] {
            assert!(
                GeoCell::validate_radius(radius, MAX).is_err(),
                "radius {radius} should be rejected"
            );
        }
        assert!(GeoCell::validate_radius(1.0, MAX).is_ok());
        assert!(GeoCell::validate_radius(MAX, MAX).is_ok());
    }
}
