use std::fmt;

use serde::Serialize;

use crate::error::{LinkError, Result};

/// Number of controllable joints.
pub const JOINT_COUNT: usize = 21;

/// Mechanical group a joint belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JointGroup {
    LeftArm,
    RightArm,
    Waist,
    Chassis,
    Lift,
}

impl JointGroup {
    pub fn as_str(self) -> &'static str {
        match self {
            JointGroup::LeftArm => "left_arm",
            JointGroup::RightArm => "right_arm",
            JointGroup::Waist => "waist",
            JointGroup::Chassis => "chassis",
            JointGroup::Lift => "lift",
        }
    }
}

impl fmt::Display for JointGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// (group, joints in group, min, max)
const JOINT_TABLE: [(JointGroup, usize, f64, f64); 5] = [
    (JointGroup::LeftArm, 8, -180.0, 180.0),
    (JointGroup::RightArm, 8, -180.0, 180.0),
    (JointGroup::Waist, 2, -90.0, 90.0),
    (JointGroup::Chassis, 2, -1000.0, 1000.0),
    (JointGroup::Lift, 1, 0.0, 500.0),
];

/// Static limits and runtime state of one joint.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JointConfig {
    pub id: usize,
    pub name: String,
    pub group: JointGroup,
    pub min_angle: f64,
    pub max_angle: f64,
    pub current_angle: f64,
    pub enabled: bool,
}

impl JointConfig {
    /// Bound `angle` to this joint's range.
    ///
    /// NaN carries no usable target, so it maps to the current angle.
    pub fn clamp(&self, angle: f64) -> f64 {
        if angle.is_nan() {
            return self.current_angle;
        }
        angle.clamp(self.min_angle, self.max_angle)
    }
}

/// The fixed table of 21 joints and their mutable state.
///
/// Ids are dense indices `0..JOINT_COUNT`. Every mutator validates the id and
/// changes nothing when it is out of range.
#[derive(Debug, Clone)]
pub struct JointRegistry {
    joints: Vec<JointConfig>,
}

impl JointRegistry {
    pub fn new() -> Self {
        let mut joints = Vec::with_capacity(JOINT_COUNT);
        for (group, count, min_angle, max_angle) in JOINT_TABLE {
            for n in 1..=count {
                let name = if count == 1 {
                    group.as_str().to_string()
                } else {
                    format!("{group}_{n}")
                };
                joints.push(JointConfig {
                    id: joints.len(),
                    name,
                    group,
                    min_angle,
                    max_angle,
                    current_angle: 0.0_f64.clamp(min_angle, max_angle),
                    enabled: false,
                });
            }
        }
        Self { joints }
    }

    pub fn len(&self) -> usize {
        self.joints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.joints.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &JointConfig> {
        self.joints.iter()
    }

    /// Check that `id` names a joint.
    pub fn validate(&self, id: usize) -> Result<()> {
        if id < self.joints.len() {
            Ok(())
        } else {
            Err(LinkError::OutOfRangeJoint(id))
        }
    }

    fn get(&self, id: usize) -> Result<&JointConfig> {
        self.joints.get(id).ok_or(LinkError::OutOfRangeJoint(id))
    }

    fn get_mut(&mut self, id: usize) -> Result<&mut JointConfig> {
        self.joints.get_mut(id).ok_or(LinkError::OutOfRangeJoint(id))
    }

    /// Bound `angle` to the joint's limits without storing it.
    pub fn clamp(&self, id: usize, angle: f64) -> Result<f64> {
        Ok(self.get(id)?.clamp(angle))
    }

    /// Store the clamped angle and return the value actually stored.
    pub fn set_current_angle(&mut self, id: usize, angle: f64) -> Result<f64> {
        let joint = self.get_mut(id)?;
        joint.current_angle = joint.clamp(angle);
        Ok(joint.current_angle)
    }

    pub fn current_angle(&self, id: usize) -> Result<f64> {
        Ok(self.get(id)?.current_angle)
    }

    pub fn set_enabled(&mut self, id: usize, enabled: bool) -> Result<()> {
        self.get_mut(id)?.enabled = enabled;
        Ok(())
    }

    pub fn set_all_enabled(&mut self, enabled: bool) {
        for joint in &mut self.joints {
            joint.enabled = enabled;
        }
    }

    pub fn is_enabled(&self, id: usize) -> Result<bool> {
        Ok(self.get(id)?.enabled)
    }

    /// Read-only copy of one joint, `None` for an invalid id.
    pub fn snapshot(&self, id: usize) -> Option<JointConfig> {
        self.joints.get(id).cloned()
    }
}

impl Default for JointRegistry {
    fn default() -> Self {
        Self::new()
    }
}
