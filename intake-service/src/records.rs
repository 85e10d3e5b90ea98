//! Record type descriptors
//!
//! Every sensitive record type is described by one static [`RecordSpec`]:
//! which fields are encrypted and with which declared kind, which plaintext
//! fields callers may see, what the validation boundary checks, and which
//! completion flag on the patient profile gates its submission.

use crypto::EncryptionMode;
use database_layer::{FieldKind, SensitiveFieldSet, CREATED_AT_FIELD, ID_FIELD};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use FieldKind::{Boolean as B, Number as N, Text as T};

/// Patient profile fields every form carries in plaintext
pub const USER_ID_FIELD: &str = "userId";
pub const ADMIN_ID_FIELD: &str = "adminId";
pub const PATIENT_ID_FIELD: &str = "patientId";

/// Sensitive fields looked up without regard to case; folded to lower case before encryption
const CASE_INSENSITIVE_FIELDS: &[&str] = &["email"];

/// The record types of the intake platform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    User,
    AdminUser,
    PatientInfoForm,
    Injury,
    SymptomChecklist,
    AdditionalSymptoms,
    Headache,
    SleepDisturbance,
    BodyPain,
    Allergies,
    CurrentMedications,
    PastMedications,
    FamilyHistory,
    DevelopmentalHistory,
    SurgicalHistory,
    SeizureHistory,
    SubstanceUseHistory,
    PreviousHeadInjuries,
    ConcussionDetails,
    PreviousTests,
}

impl RecordKind {
    pub const ALL: [RecordKind; 20] = [
        RecordKind::User,
        RecordKind::AdminUser,
        RecordKind::PatientInfoForm,
        RecordKind::Injury,
        RecordKind::SymptomChecklist,
        RecordKind::AdditionalSymptoms,
        RecordKind::Headache,
        RecordKind::SleepDisturbance,
        RecordKind::BodyPain,
        RecordKind::Allergies,
        RecordKind::CurrentMedications,
        RecordKind::PastMedications,
        RecordKind::FamilyHistory,
        RecordKind::DevelopmentalHistory,
        RecordKind::SurgicalHistory,
        RecordKind::SeizureHistory,
        RecordKind::SubstanceUseHistory,
        RecordKind::PreviousHeadInjuries,
        RecordKind::ConcussionDetails,
        RecordKind::PreviousTests,
    ];

    /// Patient-submitted forms and histories, in composite view order
    pub fn forms() -> impl Iterator<Item = RecordKind> {
        Self::ALL.into_iter().filter(|kind| kind.is_form())
    }

    /// Whether this kind is submitted by a patient (as opposed to a profile)
    pub fn is_form(self) -> bool {
        !matches!(self, RecordKind::User | RecordKind::AdminUser)
    }

    pub fn spec(self) -> &'static RecordSpec {
        match self {
            RecordKind::User => &USER,
            RecordKind::AdminUser => &ADMIN_USER,
            RecordKind::PatientInfoForm => &PATIENT_INFO_FORM,
            RecordKind::Injury => &INJURY,
            RecordKind::SymptomChecklist => &SYMPTOM_CHECKLIST,
            RecordKind::AdditionalSymptoms => &ADDITIONAL_SYMPTOMS,
            RecordKind::Headache => &HEADACHE,
            RecordKind::SleepDisturbance => &SLEEP_DISTURBANCE,
            RecordKind::BodyPain => &BODY_PAIN,
            RecordKind::Allergies => &ALLERGIES,
            RecordKind::CurrentMedications => &CURRENT_MEDICATIONS,
            RecordKind::PastMedications => &PAST_MEDICATIONS,
            RecordKind::FamilyHistory => &FAMILY_HISTORY,
            RecordKind::DevelopmentalHistory => &DEVELOPMENTAL_HISTORY,
            RecordKind::SurgicalHistory => &SURGICAL_HISTORY,
            RecordKind::SeizureHistory => &SEIZURE_HISTORY,
            RecordKind::SubstanceUseHistory => &SUBSTANCE_USE_HISTORY,
            RecordKind::PreviousHeadInjuries => &PREVIOUS_HEAD_INJURIES,
            RecordKind::ConcussionDetails => &CONCUSSION_DETAILS,
            RecordKind::PreviousTests => &PREVIOUS_TESTS,
        }
    }

    pub fn collection(self) -> &'static str {
        self.spec().collection
    }

    /// Find the kind stored in `collection`
    pub fn from_collection(collection: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.collection() == collection)
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.spec().label)
    }
}

impl FromStr for RecordKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_collection(s).ok_or_else(|| format!("Unknown collection: {s}"))
    }
}

/// Static description of one record type
#[derive(Debug)]
pub struct RecordSpec {
    pub collection: &'static str,
    pub label: &'static str,
    /// Per-record business identifier: (field, prefix)
    pub business_id: Option<(&'static str, &'static str)>,
    /// Declared sensitive field set
    pub sensitive: &'static [(&'static str, FieldKind)],
    /// Plaintext fields exposed by the decrypt projection
    pub structural: &'static [&'static str],
    /// Fields the validation boundary requires
    pub required: &'static [&'static str],
    /// Closed value sets checked by the validation boundary
    pub enums: &'static [(&'static str, &'static [&'static str])],
    /// Flag on the patient profile that makes this a one-shot form
    pub completion_flag: Option<&'static str>,
    /// Mode used unless the deployment overrides the collection
    pub default_mode: EncryptionMode,
}

impl RecordSpec {
    /// The declared sensitive field set in the given mode
    pub fn field_set(&self, mode: EncryptionMode) -> SensitiveFieldSet {
        let set = self
            .sensitive
            .iter()
            .fold(SensitiveFieldSet::new(self.collection, mode), |set, &(name, kind)| {
                set.with_field(name, kind)
            });
        CASE_INSENSITIVE_FIELDS
            .iter()
            .fold(set, |set, name| set.case_insensitive(name))
    }

    /// Allow-list of the decrypt projection
    pub fn projection(&self) -> Vec<&'static str> {
        let mut fields = vec![ID_FIELD, PATIENT_ID_FIELD, CREATED_AT_FIELD];
        if let Some((id_field, _)) = self.business_id {
            fields.push(id_field);
        }
        fields.extend_from_slice(self.structural);
        fields.extend(self.sensitive.iter().map(|(name, _)| *name));
        fields
    }
}

/// Completion flags carried by the patient profile
pub fn completion_flags() -> impl Iterator<Item = &'static str> {
    RecordKind::ALL
        .into_iter()
        .filter_map(|kind| kind.spec().completion_flag)
}

// =============================================================================
// PROFILES
// =============================================================================

// Profiles carry one cipher per collection, so deterministic mode for the
// e-mail lookup makes every profile field deterministic. Equal names, birth
// dates or phone numbers are therefore visible as equal ciphertext.
const USER: RecordSpec = RecordSpec {
    collection: "users",
    label: "patient profile",
    business_id: None,
    sensitive: &[
        ("email", T),
        ("firstName", T),
        ("lastName", T),
        ("dateOfBirth", T),
        ("phoneNumber", T),
        ("insuranceProvider", T),
    ],
    structural: &[
        ADMIN_ID_FIELD,
        "profileImageUrl",
        "isPatientInfoFormCompleted",
        "isInjuryFormCompleted",
        "isSymptomChecklistFormCompleted",
        "isAdditionalSymptomFormCompleted",
        "isHeadacheFormCompleted",
        "isSleepDisturbanceFormCompleted",
        "isDevelopmentalHistoryFormCompleted",
        "isSeizureHistoryFormCompleted",
        "isSubstanceUseHistoryFormCompleted",
        "isPreviousHeadInjuriesFormCompleted",
        "isPreviousTestsFormCompleted",
    ],
    required: &["email", "firstName", "lastName", ADMIN_ID_FIELD],
    enums: &[],
    completion_flag: None,
    default_mode: EncryptionMode::Deterministic,
};

const ADMIN_USER: RecordSpec = RecordSpec {
    collection: "adminUsers",
    label: "provider profile",
    business_id: None,
    sensitive: &[("email", T), ("fullName", T), ("phoneNumber", T)],
    structural: &["userName", "speciality", "isAdmin", "profileImageUrl"],
    required: &["userName", "email"],
    enums: &[],
    completion_flag: None,
    default_mode: EncryptionMode::Deterministic,
};

// =============================================================================
// ONE-SHOT FORMS
// =============================================================================

const PATIENT_INFO_FORM: RecordSpec = RecordSpec {
    collection: "patientInfoForms",
    label: "patient info form",
    business_id: None,
    sensitive: &[
        ("fullName", T),
        ("dateOfExamination", T),
        ("race", T),
        ("numberOfChildren", N),
        ("hearingImpairment", B),
        ("hearingAids", B),
        ("glassesOrContacts", B),
        ("occupation", T),
        ("employer", T),
        ("employerAddress", T),
        ("enrolledInSchool", B),
        ("school", T),
    ],
    structural: &["maritalStatus"],
    required: &[
        "fullName",
        "dateOfExamination",
        "race",
        "maritalStatus",
        "numberOfChildren",
        "hearingImpairment",
        "hearingAids",
        "glassesOrContacts",
        "occupation",
        "employer",
        "employerAddress",
        "enrolledInSchool",
    ],
    enums: &[("maritalStatus", &["single", "married", "divorced", "widowed"])],
    completion_flag: Some("isPatientInfoFormCompleted"),
    default_mode: EncryptionMode::Randomized,
};

const INJURY: RecordSpec = RecordSpec {
    collection: "injuries",
    label: "injury form",
    business_id: Some(("injuryId", "INJ")),
    sensitive: &[
        ("sportOrActivity", T),
        ("setting", T),
        ("settingDetails", T),
        ("position", T),
        ("injuryDescription", T),
        ("impactType", T),
        ("impactDetails", T),
        ("locationOfContact", T),
        ("LOCduration", T),
        ("memoryTroubleDuration", T),
        ("confusionDuration", T),
        ("stopDuration", T),
        ("returnDuration", T),
        ("ERdetails", T),
    ],
    structural: &[
        "dateOfInjury",
        "looseOfConsciousness",
        "troubleRemembering",
        "feelFocussed",
        "stoppedParticipation",
        "returnToParticipation",
        "emergencyRoomVisit",
        "testPerformed",
    ],
    required: &["setting"],
    enums: &[("setting", &["game", "practice", "other"])],
    completion_flag: Some("isInjuryFormCompleted"),
    default_mode: EncryptionMode::Randomized,
};

const SYMPTOM_CHECKLIST: RecordSpec = RecordSpec {
    collection: "symptomChecklists",
    label: "symptom checklist",
    business_id: Some(("symptomChecklistId", "SCL")),
    sensitive: &[
        ("headache", N),
        ("pressureInHead", N),
        ("neckPain", N),
        ("troubleFallingAsleep", N),
        ("drowsiness", N),
        ("nauseaOrVomiting", N),
        ("fatigueOrLowEnergy", N),
        ("dizziness", N),
        ("blurredVision", N),
        ("balanceProblems", N),
        ("sensitivityToLight", N),
        ("sensitivityToNoise", N),
        ("feelingSlowedDown", N),
        ("feelingInAFog", N),
        ("dontFeelRight", N),
        ("difficultyConcentrating", N),
        ("difficultyRemembering", N),
        ("confusion", N),
        ("moreEmotional", N),
        ("irritability", N),
        ("sadnessOrDepression", N),
        ("nervousOrAnxious", N),
        ("worseWithPhysicalActivity", B),
        ("worseWithSocialSituations", B),
        ("totalSymptoms", N),
        ("symptomSeverityScore", N),
    ],
    structural: &["injuryId"],
    required: &[],
    enums: &[],
    completion_flag: Some("isSymptomChecklistFormCompleted"),
    default_mode: EncryptionMode::Randomized,
};

const ADDITIONAL_SYMPTOMS: RecordSpec = RecordSpec {
    collection: "additionalSymptoms",
    label: "additional symptoms form",
    business_id: Some(("additionalSymptomsId", "ADS")),
    sensitive: &[
        ("generalSomatic", N),
        ("painInOtherParts", N),
        ("problemsWithSleeping", N),
        ("primaryNeurologicalSymptoms", N),
        ("gaitOrBalanceProblems", N),
        ("visionLossOrChange", N),
        ("hearingLossOrChange", N),
        ("lossOfSmellOrTaste", N),
        ("speechChanges", N),
        ("weakness", N),
        ("tremors", N),
        ("bowelOrBladderDisturbances", N),
        ("sexualDysfunction", N),
        ("difficultyPlanningAndOrganizing", N),
        ("difficultyAnticipatingConsequences", N),
        ("wordFindingDifficulties", N),
        ("difficultyUnderstandingConversations", N),
        ("lostInFamiliarEnvironment", N),
        ("lossOfAppetite", N),
        ("suicidalOrHomicidalThoughts", N),
        ("verballyOrPhysicallyAggressive", N),
        ("personalityChanges", N),
        ("disInhibition", N),
        ("avoidanceBehaviors", N),
        ("intrusiveDistressingThoughts", N),
        ("repetitiveMotorActivity", N),
        ("worseWithPhysicalActivity", B),
        ("worseWithMentalActivity", B),
        ("totalSymptoms", N),
        ("symptomSeverityScore", N),
    ],
    structural: &["injuryId", "painLocation"],
    required: &[],
    enums: &[],
    completion_flag: Some("isAdditionalSymptomFormCompleted"),
    default_mode: EncryptionMode::Randomized,
};

const HEADACHE: RecordSpec = RecordSpec {
    collection: "headaches",
    label: "headache form",
    business_id: Some(("headacheId", "HDA")),
    sensitive: &[
        ("ageOrDateOfOnset", T),
        ("pastHeadacheProblems", B),
        ("pastHeadacheDescription", T),
        ("locationOfPain", T),
        ("frequency", T),
        ("painAtPresent", N),
        ("painAtWorst", N),
        ("qualityDescription", T),
        ("timingDescription", T),
        ("durationDescription", T),
        ("triggersDescription", T),
        ("associatedSymptoms", T),
        ("reliefFactors", T),
        ("daysMissingWorkOrSchool", T),
        ("daysMissingSocialEvents", T),
    ],
    structural: &[],
    required: &[],
    enums: &[],
    completion_flag: Some("isHeadacheFormCompleted"),
    default_mode: EncryptionMode::Randomized,
};

const SLEEP_DISTURBANCE: RecordSpec = RecordSpec {
    collection: "sleepDisturbances",
    label: "sleep disturbance form",
    business_id: Some(("sleepDisturbanceId", "SLP")),
    sensitive: &[
        ("hasSleepDisturbance", B),
        ("difficultyFallingAsleep", B),
        ("fallingAsleepSeverity", N),
        ("fallingAsleepProgression", T),
        ("difficultyStayingAsleep", B),
        ("stayingAsleepSeverity", N),
        ("stayingAsleepProgression", T),
        ("nightmares", B),
        ("nightmaresSeverity", N),
        ("nightmaresProgression", T),
        ("actsOutDreams", B),
        ("actsOutDreamsSeverity", N),
        ("actsOutDreamsProgression", T),
        ("earlyMorningWakening", B),
        ("earlyWakeningSeverity", N),
        ("earlyWakeningProgression", T),
        ("daytimeDrowsiness", B),
        ("drowsinessSeverity", N),
        ("drowsinessProgression", T),
        ("naps", B),
        ("numberOfNaps", N),
    ],
    structural: &[],
    required: &[],
    enums: &[],
    completion_flag: Some("isSleepDisturbanceFormCompleted"),
    default_mode: EncryptionMode::Randomized,
};

const DEVELOPMENTAL_HISTORY: RecordSpec = RecordSpec {
    collection: "developmentalHistories",
    label: "developmental history",
    business_id: Some(("devHistoryID", "DEV")),
    sensitive: &[
        ("learningDisabilities", B),
        ("learningDisabilitiesDescription", T),
        ("motorVehicleAccidentHistory", B),
        ("headTrauma", B),
        ("brainSurgery", B),
        ("residualImpairments", B),
        ("accidentDates", T),
        ("impairmentDescription", T),
    ],
    structural: &[],
    required: &[],
    enums: &[],
    completion_flag: Some("isDevelopmentalHistoryFormCompleted"),
    default_mode: EncryptionMode::Randomized,
};

const SEIZURE_HISTORY: RecordSpec = RecordSpec {
    collection: "seizureHistories",
    label: "seizure history",
    business_id: Some(("seizureHistoryID", "SZR")),
    sensitive: &[
        ("hasSeizureHistory", B),
        ("dateOfOnset", T),
        ("typeOfSeizure", T),
        ("dateOfLastSeizure", T),
        ("currentMedications", T),
    ],
    structural: &[],
    required: &[],
    enums: &[],
    completion_flag: Some("isSeizureHistoryFormCompleted"),
    default_mode: EncryptionMode::Randomized,
};

const SUBSTANCE_USE_HISTORY: RecordSpec = RecordSpec {
    collection: "substanceUseHistories",
    label: "substance use history",
    business_id: Some(("SubstanceHistoryID", "SUB")),
    sensitive: &[
        ("usesAlcohol", B),
        ("alcoholLongestSobriety", T),
        ("alcoholLastUse", T),
        ("substancesLongestSobriety", T),
        ("substancesLastUse", T),
        ("alcoholDaysPerWeek", N),
        ("alcoholDrinksPerOccasion", N),
        ("alcoholAgeFirstUse", N),
        ("alcoholAgeLastUse", N),
        ("alcoholBinges", B),
        ("alcoholBlackouts", B),
        ("alcoholDeliriumTremens", B),
        ("alcoholRelatedSeizures", B),
        ("usesNicotine", B),
        ("nicotineAgeFirstUse", N),
        ("nicotineType", T),
        ("nicotineAmountPerDay", T),
        ("nicotineLastUse", T),
        ("usesSteroids", B),
        ("steroidsAgeFirstUse", N),
        ("steroidsFrequency", T),
        ("steroidsDuration", T),
        ("steroidsLastUse", T),
        ("usesOtherSubstances", B),
        ("substancesUsed", T),
        ("substancesAgeFirstUse", N),
        ("substancesTypicalAmount", T),
        ("substancesFrequency", T),
        ("substancesCurrentlySober", B),
    ],
    structural: &["alcoholCurrentlySober"],
    required: &[],
    enums: &[],
    completion_flag: Some("isSubstanceUseHistoryFormCompleted"),
    default_mode: EncryptionMode::Randomized,
};

const PREVIOUS_HEAD_INJURIES: RecordSpec = RecordSpec {
    collection: "previousHeadInjuries",
    label: "previous head injuries",
    business_id: Some(("previousInjuryID", "PHI")),
    sensitive: &[("hasPreviousInjuries", B), ("totalNumberOfInjuries", N)],
    structural: &[],
    required: &[],
    enums: &[],
    completion_flag: Some("isPreviousHeadInjuriesFormCompleted"),
    default_mode: EncryptionMode::Randomized,
};

const PREVIOUS_TESTS: RecordSpec = RecordSpec {
    collection: "previousTests",
    label: "previous tests",
    business_id: Some(("testID", "TST")),
    sensitive: &[
        ("neurologicalImaging", B),
        ("neurologicalImagingDates", T),
        ("impactTesting", B),
        ("impactTestingDates", T),
        ("neuroPsychologicalTesting", B),
        ("neuroPsychologicalTestingDates", T),
        ("EEG", B),
        ("EEGDates", T),
        ("bloodWork", B),
        ("bloodWorkDates", T),
    ],
    structural: &[],
    required: &[],
    enums: &[],
    completion_flag: Some("isPreviousTestsFormCompleted"),
    default_mode: EncryptionMode::Randomized,
};

// =============================================================================
// REPEATABLE HISTORIES
// =============================================================================

const BODY_PAIN: RecordSpec = RecordSpec {
    collection: "bodyPains",
    label: "body pain entry",
    business_id: Some(("bodyPainId", "BPN")),
    sensitive: &[
        ("bodyPart", T),
        ("dateOfOnset", T),
        ("severity", N),
        ("frequency", T),
        ("duration", T),
        ("triggers", T),
        ("relievedBy", T),
        ("progression", T),
    ],
    structural: &[],
    required: &["bodyPart"],
    enums: &[("progression", &["Better", "Same", "Worse"])],
    completion_flag: None,
    default_mode: EncryptionMode::Randomized,
};

const ALLERGIES: RecordSpec = RecordSpec {
    collection: "allergies",
    label: "allergy",
    business_id: Some(("allergyID", "ALG")),
    sensitive: &[("allergen", T), ("reaction", T), ("treatment", T)],
    structural: &[],
    required: &["allergen"],
    enums: &[],
    completion_flag: None,
    default_mode: EncryptionMode::Randomized,
};

const CURRENT_MEDICATIONS: RecordSpec = RecordSpec {
    collection: "currentMedications",
    label: "current medication",
    business_id: Some(("medicationID", "MED")),
    sensitive: &[
        ("medicineName", T),
        ("reasonForTaking", T),
        ("dosage", T),
        ("amount", T),
    ],
    structural: &[],
    required: &["medicineName"],
    enums: &[],
    completion_flag: None,
    default_mode: EncryptionMode::Randomized,
};

const PAST_MEDICATIONS: RecordSpec = RecordSpec {
    collection: "pastMedications",
    label: "past medication",
    business_id: Some(("pastMedicationID", "PMD")),
    sensitive: &[
        ("medicineName", T),
        ("reasonForTaking", T),
        ("dosage", T),
        ("amount", T),
    ],
    structural: &[],
    required: &["medicineName"],
    enums: &[],
    completion_flag: None,
    default_mode: EncryptionMode::Randomized,
};

const FAMILY_HISTORY: RecordSpec = RecordSpec {
    collection: "familyHistories",
    label: "family history entry",
    business_id: Some(("familyHistoryID", "FAM")),
    sensitive: &[
        ("relation", T),
        ("dementia", B),
        ("stroke", B),
        ("seizure", B),
        ("highBloodPressure", B),
        ("migraine", B),
        ("headTrauma", B),
        ("diabetes", B),
        ("parkinsonDisease", B),
        ("learningDisabilities", B),
        ("substanceAbuse", B),
        ("otherConditions", T),
    ],
    structural: &[],
    required: &["relation"],
    enums: &[],
    completion_flag: None,
    default_mode: EncryptionMode::Randomized,
};

const SURGICAL_HISTORY: RecordSpec = RecordSpec {
    collection: "surgicalHistories",
    label: "surgical history entry",
    business_id: Some(("surgeryID", "SRG")),
    sensitive: &[
        ("surgeryDate", T),
        ("bodyPart", T),
        ("procedurePerformed", T),
    ],
    structural: &[],
    required: &[],
    enums: &[],
    completion_flag: None,
    default_mode: EncryptionMode::Randomized,
};

const CONCUSSION_DETAILS: RecordSpec = RecordSpec {
    collection: "concussionDetails",
    label: "concussion details",
    business_id: Some(("concussionDetailID", "CON")),
    sensitive: &[
        ("concussionNumber", N),
        ("knockedUnconscious", B),
        ("soughtMedicalTreatment", B),
        ("symptomDuration", T),
        ("injuryDate", T),
    ],
    structural: &["previousInjuryID"],
    required: &[],
    enums: &[],
    completion_flag: None,
    default_mode: EncryptionMode::Randomized,
};
