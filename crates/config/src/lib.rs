//! 统一配置中心
//!
//! 提供应用的全局配置管理，包括：
//! - 服务监听
//! - JWT 认证
//! - 地理分桶粒度
//! - 里程碑阈值

use serde::{Deserialize, Serialize};
use std::env;

/// 全局应用配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// 服务配置
    pub server: ServerConfig,
    /// JWT 认证配置
    pub jwt: JwtConfig,
    /// 地理分桶配置
    pub geo: GeoConfig,
    /// 社区里程碑阈值
    pub milestones: MilestoneConfig,
}

/// 服务器配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// JWT 配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub expiration_hours: i64,
}

/// 地理分桶配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeoConfig {
    /// 网格单元边长（十进制度），0.05 度约等于 5.5 公里
    pub cell_size_deg: f64,
    /// 位置订阅与警报投放允许的最大半径（米）
    ///
    /// 覆盖的网格数随半径平方增长，超出此上限的请求被整体拒绝。
    pub max_radius_m: f64,
}

impl Default for GeoConfig {
    fn default() -> Self {
        Self {
            cell_size_deg: 0.05,
            max_radius_m: 50_000.0,
        }
    }
}

/// 影响力里程碑的全站广播档位
///
/// 里程碑值恰好命中其中一档时，除了发给本人，还在全局主题上
/// 作为社区里程碑广播；落在档位之间的值不做全站庆祝。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MilestoneConfig {
    pub thresholds: Vec<u64>,
}

impl Default for MilestoneConfig {
    fn default() -> Self {
        Self {
            thresholds: vec![100, 500, 1000, 5000, 10000],
        }
    }
}

impl MilestoneConfig {
    /// 该里程碑值是否值得全站庆祝
    pub fn is_community_milestone(&self, value: u64) -> bool {
        self.thresholds.contains(&value)
    }
}

impl AppConfig {
    /// 从环境变量加载配置
    ///
    /// JWT_SECRET 若缺失将 panic，确保生产环境不会使用不安全的默认值。
    pub fn from_env() -> Self {
        Self {
            server: ServerConfig {
                host: env::var("SERVER_HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
                port: env::var("SERVER_PORT")
                    .ok()
                    .and_then(|value| value.parse().ok())
                    .unwrap_or(8080),
            },
            jwt: JwtConfig {
                secret: env::var("JWT_SECRET")
                    .expect("JWT_SECRET environment variable must be set"),
                expiration_hours: env::var("JWT_EXPIRATION_HOURS")
                    .ok()
                    .and_then(|value| value.parse().ok())
                    .unwrap_or(24),
            },
            geo: GeoConfig {
                cell_size_deg: env::var("GEO_CELL_SIZE_DEG")
                    .ok()
                    .and_then(|value| value.parse().ok())
                    .unwrap_or_else(|| GeoConfig::default().cell_size_deg),
                max_radius_m: env::var("GEO_MAX_RADIUS_M")
                    .ok()
                    .and_then(|value| value.parse().ok())
                    .unwrap_or_else(|| GeoConfig::default().max_radius_m),
            },
            milestones: MilestoneConfig {
                thresholds: env::var("MILESTONE_THRESHOLDS")
                    .ok()
                    .map(|raw| {
                        raw.split(',')
                            .filter_map(|part| part.trim().parse().ok())
                            .collect()
                    })
                    .unwrap_or_else(|| MilestoneConfig::default().thresholds),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn milestone_tiers_are_exact_matches() {
        let config = MilestoneConfig::default();
        assert!(config.is_community_milestone(100));
        assert!(config.is_community_milestone(500));
        assert!(config.is_community_milestone(10000));
        // 档位之间的值不触发全站广播
        assert!(!config.is_community_milestone(99));
        assert!(!config.is_community_milestone(650));
        assert!(!config.is_community_milestone(7500));
    }
}
